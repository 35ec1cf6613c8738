//! Configuration-file loading (§6 "Configuration format"). Produces a typed
//! [`Config`] record; the core treats this crate as the configuration
//! provider and never parses a CLI itself (spec.md §1, out of scope).

use crate::error::ConfigError;
use aladdin_ir::binding::PartitionType;
use std::io::BufRead;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LoopRef {
    pub function: String,
    pub label: String,
}

#[derive(Clone, Debug)]
pub struct PartitionSpec {
    pub partition_type: PartitionType,
    pub complete: bool,
    pub array: String,
    pub total_size: u32,
    pub word_size: u32,
    pub factor: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub flatten: Vec<LoopRef>,
    pub unrolling: Vec<(LoopRef, u32)>,
    pub partitions: Vec<PartitionSpec>,
    pub pipelining: Vec<(LoopRef, Option<u32>)>,
    pub cache: Vec<(String, u64)>,
    pub dma: Vec<String>,
    pub fuse_reg_load_stores: bool,
    pub cycle_time_ns: f64,
}

impl Config {
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, ConfigError> {
        let mut cfg = Config { cycle_time_ns: 6.0, ..Config::default() };

        for (idx, line) in reader.lines().enumerate() {
            let line_no = (idx + 1) as u64;
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let kind = fields[0];
            let args = &fields[1..];

            match kind {
                "flatten" => {
                    let [function, label] = require(args, line_no, "flatten,function,label")?;
                    cfg.flatten.push(LoopRef { function, label });
                }
                "unrolling" => {
                    let [function, label, factor] =
                        require(args, line_no, "unrolling,function,label,factor")?;
                    let factor = parse_u32(&factor, line_no)?;
                    cfg.unrolling.push((LoopRef { function, label }, factor));
                }
                "partition" => {
                    if args.len() < 2 {
                        return Err(ConfigError::Malformed {
                            line: line_no,
                            detail: "partition entry requires at least type,array".to_string(),
                        });
                    }
                    let partition_type_raw = args[0];
                    let array = args[1].to_string();
                    let complete = partition_type_raw == "complete";
                    let partition_type = match partition_type_raw {
                        "cyclic" => PartitionType::Cyclic,
                        "block" | "complete" => PartitionType::Block,
                        other => {
                            return Err(ConfigError::Malformed {
                                line: line_no,
                                detail: format!("unknown partition type {other:?}"),
                            })
                        }
                    };
                    let (total_size, word_size, factor) = if complete {
                        let total_size = args.get(2).map(|s| parse_u32(s, line_no)).transpose()?.unwrap_or(0);
                        let word_size = args.get(3).map(|s| parse_u32(s, line_no)).transpose()?.unwrap_or(4);
                        (total_size, word_size, 0)
                    } else {
                        if args.len() != 5 {
                            return Err(ConfigError::Malformed {
                                line: line_no,
                                detail: "partition,type,array,total_size,word_size,factor expected"
                                    .to_string(),
                            });
                        }
                        (
                            parse_u32(args[2], line_no)?,
                            parse_u32(args[3], line_no)?,
                            parse_u32(args[4], line_no)?,
                        )
                    };
                    if !complete && factor > 0 && factor * word_size > total_size {
                        return Err(ConfigError::IncompatiblePartitionFactor {
                            array,
                            factor,
                            word_size,
                            total_size,
                        });
                    }
                    cfg.partitions.push(PartitionSpec {
                        partition_type,
                        complete,
                        array,
                        total_size,
                        word_size,
                        factor,
                    });
                }
                "pipelining" => {
                    if args.len() < 2 || args.len() > 3 {
                        return Err(ConfigError::Malformed {
                            line: line_no,
                            detail: "pipelining,function,label[,II] expected".to_string(),
                        });
                    }
                    let ii = args.get(2).map(|s| parse_u32(s, line_no)).transpose()?;
                    cfg.pipelining.push((
                        LoopRef { function: args[0].to_string(), label: args[1].to_string() },
                        ii,
                    ));
                }
                "cache" => {
                    let [array, size] = require(args, line_no, "cache,array,size")?;
                    let size: u64 = size.parse().map_err(|_| ConfigError::Malformed {
                        line: line_no,
                        detail: format!("expected integer size, got {size:?}"),
                    })?;
                    cfg.cache.push((array, size));
                }
                "dma" => {
                    let [array] = require(args, line_no, "dma,array")?;
                    cfg.dma.push(array);
                }
                "cycle_time" => {
                    let [ns] = require(args, line_no, "cycle_time,ns")?;
                    cfg.cycle_time_ns = ns.parse().map_err(|_| ConfigError::Malformed {
                        line: line_no,
                        detail: format!("expected float ns, got {ns:?}"),
                    })?;
                }
                "fuse_reg_load_stores" => {
                    cfg.fuse_reg_load_stores = true;
                }
                other => {
                    return Err(ConfigError::UnknownKind { line: line_no, kind: other.to_string() })
                }
            }
        }

        Ok(cfg)
    }
}

fn parse_u32(field: &str, line: u64) -> Result<u32, ConfigError> {
    field.parse::<u32>().map_err(|_| ConfigError::Malformed {
        line,
        detail: format!("expected an integer, got {field:?}"),
    })
}

/// Destructure `args` into exactly `N` owned strings, or report a malformed
/// configuration entry with `usage` as the expected shape.
fn require<const N: usize>(
    args: &[&str],
    line: u64,
    usage: &str,
) -> Result<[String; N], ConfigError> {
    if args.len() != N {
        return Err(ConfigError::Malformed {
            line,
            detail: format!("expected `{usage}`, got {} field(s)", args.len()),
        });
    }
    Ok(std::array::from_fn(|i| args[i].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_every_known_kind() {
        let text = "\
flatten,main,loop1
unrolling,main,loop2,4
partition,cyclic,a,1024,8,2
pipelining,main,loop3,1
cache,c,4096
dma,d
cycle_time,1.25
";
        let cfg = Config::parse(Cursor::new(text)).unwrap();
        assert_eq!(cfg.flatten.len(), 1);
        assert_eq!(cfg.unrolling[0].1, 4);
        assert_eq!(cfg.partitions[0].factor, 2);
        assert_eq!(cfg.pipelining[0].1, Some(1));
        assert_eq!(cfg.cache[0].1, 4096);
        assert_eq!(cfg.dma[0], "d");
        assert_eq!(cfg.cycle_time_ns, 1.25);
    }

    #[test]
    fn unknown_kind_aborts_loading() {
        let err = Config::parse(Cursor::new("bogus,1,2\n")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKind { line: 1, .. }));
    }

    #[test]
    fn incompatible_partition_factor_is_rejected() {
        let err = Config::parse(Cursor::new("partition,cyclic,a,16,8,4\n")).unwrap_err();
        assert!(matches!(err, ConfigError::IncompatiblePartitionFactor { .. }));
    }
}
