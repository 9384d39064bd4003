use dagfs_store::{AbortOptions, BlockService};
use dagfs_types::{codec_of, Cid, Codec};
use ipld_core::ipld::Ipld;
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::ipld::to_ipld;
use crate::pb;

/// Where a path resolution stopped.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// The block holding `value`.
    pub cid: Cid,
    pub value: Ipld,
    /// Segments left over because `value` is not a container.
    pub remainder: Vec<String>,
}

impl Resolution {
    /// Remaining segments joined with `/`.
    pub fn remainder_path(&self) -> String {
        self.remainder.join("/")
    }
}

enum Step {
    Done { value: Ipld, remainder: Vec<String> },
    Hop { target: Cid, remainder: Vec<String> },
}

/// Split a `/`-separated path into non-empty segments.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Walk `path` from `cid`, crossing into linked blocks as needed.
///
/// Stops early when it reaches a value that cannot be descended into and
/// reports the unconsumed segments. A path that ends on a link follows
/// it, so the result is the linked block's root value. With
/// `local_resolve` the walk never leaves the first block: it stops at the
/// first link and returns it.
pub async fn resolve(
    blocks: &BlockService,
    cid: &Cid,
    path: &str,
    local_resolve: bool,
    opts: &AbortOptions,
) -> CodecResult<Resolution> {
    let mut current = *cid;
    let mut segments = split_path(path);
    loop {
        opts.check()?;
        let codec = codec_of(&current)?;
        let bytes = blocks.get(&current, opts).await?;
        match step(&current, codec, &bytes, &segments)? {
            Step::Done { value, remainder } => {
                return Ok(Resolution {
                    cid: current,
                    value,
                    remainder,
                })
            }
            Step::Hop { target, remainder } => {
                if local_resolve {
                    return Ok(Resolution {
                        cid: current,
                        value: Ipld::Link(target),
                        remainder,
                    });
                }
                debug!(from = %current, to = %target, "resolve crossed a link");
                current = target;
                segments = remainder;
            }
        }
    }
}

fn step(cid: &Cid, codec: Codec, bytes: &[u8], path: &[String]) -> CodecResult<Step> {
    let root = to_ipld(codec, bytes)?;
    let mut here = &root;
    for (i, segment) in path.iter().enumerate() {
        let next = match here {
            Ipld::Link(target) => {
                return Ok(Step::Hop {
                    target: *target,
                    remainder: path[i..].to_vec(),
                })
            }
            Ipld::Map(map) => match map.get(segment) {
                Some(v) => v,
                None if codec == Codec::DagPb && i == 0 => {
                    return named_link(cid, bytes, segment).map(|target| Step::Hop {
                        target,
                        remainder: path[1..].to_vec(),
                    });
                }
                None => return Err(not_found(cid, segment)),
            },
            Ipld::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx))
                .ok_or_else(|| not_found(cid, segment))?,
            scalar => {
                return Ok(Step::Done {
                    value: scalar.clone(),
                    remainder: path[i..].to_vec(),
                })
            }
        };
        here = next;
    }
    match here {
        Ipld::Link(target) if !path.is_empty() => Ok(Step::Hop {
            target: *target,
            remainder: Vec::new(),
        }),
        value => Ok(Step::Done {
            value: value.clone(),
            remainder: Vec::new(),
        }),
    }
}

/// dag-pb nodes also resolve a segment by link name.
fn named_link(cid: &Cid, bytes: &[u8], name: &str) -> CodecResult<Cid> {
    pb::decode(bytes)?
        .links
        .iter()
        .find(|l| pb::link_name(l) == name)
        .map(|l| l.cid)
        .ok_or_else(|| not_found(cid, name))
}

fn not_found(cid: &Cid, segment: &str) -> CodecError {
    CodecError::PathNotFound {
        cid: *cid,
        segment: segment.to_string(),
    }
}
