//! Flagging modes and their typed parameters.
//!
//! Every mode has a fixed whitelist of parameters. Parameters arrive as
//! strings; [`ModeParams::coerce`] turns the whitelisted ones into a typed
//! struct for the mode and rejects illegal values. Unlike syntax problems,
//! coercion failures abort the whole batch.

use std::{fmt::Display, str::FromStr};

use log::{trace, warn};
use thiserror::Error;

use crate::time::quantity_to_seconds;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("Illegal value '{0}' of parameter quackmode, must be either 'beg', 'endb', 'end' or 'tail'")]
    QuackMode(String),

    #[error("Parameter {key}: '{value}' is not a number")]
    NotFloat { key: String, value: String },

    #[error("Parameter {key}: '{value}' is not an integer")]
    NotInteger { key: String, value: String },

    #[error("Parameter {key}: '{value}' is not a boolean (true/false)")]
    NotBool { key: String, value: String },

    #[error("Parameter {key}: '{value}' is not a [min,max] range")]
    NotRange { key: String, value: String },

    #[error("Parameter {key} is accepted for mode {mode} but has no handler")]
    Unhandled { mode: FlagMode, key: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown flagging mode '{0}'")]
pub struct UnknownMode(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagMode {
    Manual,
    Clip,
    Quack,
    Shadow,
    Elevation,
    Tfcrop,
    Extend,
    Rflag,
    Unflag,
    /// Flags generated by the telescope's online system.
    Online,
}

impl FlagMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FlagMode::Manual => "manual",
            FlagMode::Clip => "clip",
            FlagMode::Quack => "quack",
            FlagMode::Shadow => "shadow",
            FlagMode::Elevation => "elevation",
            FlagMode::Tfcrop => "tfcrop",
            FlagMode::Extend => "extend",
            FlagMode::Rflag => "rflag",
            FlagMode::Unflag => "unflag",
            FlagMode::Online => "online",
        }
    }

    /// The mode an agent runs in for this kind of command. Online flags are
    /// plain manual flags as far as the engine is concerned.
    pub fn agent_mode(self) -> FlagMode {
        match self {
            FlagMode::Online => FlagMode::Manual,
            m => m,
        }
    }

    /// The parameters this mode understands. Anything else is ignored.
    pub fn whitelist(self) -> &'static [&'static str] {
        match self {
            FlagMode::Manual | FlagMode::Unflag | FlagMode::Online => &[],
            FlagMode::Clip => &[
                "clipminmax",
                "expression",
                "clipoutside",
                "datacolumn",
                "channelavg",
                "clipzeros",
            ],
            FlagMode::Quack => &["quackinterval", "quackmode", "quackincrement"],
            FlagMode::Shadow => &["diameter"],
            FlagMode::Elevation => &["lowerlimit", "upperlimit"],
            FlagMode::Tfcrop => &[
                "ntime",
                "combinescans",
                "expression",
                "datacolumn",
                "timecutoff",
                "freqcutoff",
                "timefit",
                "freqfit",
                "maxnpieces",
                "flagdimension",
                "usewindowstats",
                "halfwin",
            ],
            FlagMode::Extend => &[
                "ntime",
                "combinescans",
                "extendpols",
                "growtime",
                "growfreq",
                "growaround",
                "flagneartime",
                "flagnearfreq",
            ],
            FlagMode::Rflag => &[
                "timedev",
                "freqdev",
                "timedevscale",
                "freqdevscale",
                "spectralmax",
                "spectralmin",
                "extendflags",
                "winsize",
                "ntime",
                "combinescans",
                "datacolumn",
            ],
        }
    }

    /// Agent names use the capitalised mode, e.g. "Quack".
    pub fn capitalised(self) -> String {
        let s = self.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl FromStr for FlagMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(FlagMode::Manual),
            "clip" => Ok(FlagMode::Clip),
            "quack" => Ok(FlagMode::Quack),
            "shadow" => Ok(FlagMode::Shadow),
            "elevation" => Ok(FlagMode::Elevation),
            "tfcrop" => Ok(FlagMode::Tfcrop),
            "extend" => Ok(FlagMode::Extend),
            "rflag" => Ok(FlagMode::Rflag),
            "unflag" => Ok(FlagMode::Unflag),
            "online" => Ok(FlagMode::Online),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

impl Display for FlagMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuackMode {
    Beg,
    Endb,
    End,
    Tail,
}

impl QuackMode {
    pub fn as_str(self) -> &'static str {
        match self {
            QuackMode::Beg => "beg",
            QuackMode::Endb => "endb",
            QuackMode::End => "end",
            QuackMode::Tail => "tail",
        }
    }
}

impl FromStr for QuackMode {
    type Err = CoercionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beg" => Ok(QuackMode::Beg),
            "endb" => Ok(QuackMode::Endb),
            "end" => Ok(QuackMode::End),
            "tail" => Ok(QuackMode::Tail),
            _ => Err(CoercionError::QuackMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipParams {
    /// (min, max), in the order given.
    pub clipminmax: Option<(f64, f64)>,
    pub expression: Option<String>,
    pub clipoutside: Option<bool>,
    pub datacolumn: Option<String>,
    pub channelavg: Option<bool>,
    pub clipzeros: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuackParams {
    pub quackinterval: Option<f64>,
    pub quackmode: Option<QuackMode>,
    pub quackincrement: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowParams {
    pub diameter: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElevationParams {
    pub lowerlimit: Option<f64>,
    pub upperlimit: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TfcropParams {
    /// Seconds; 0 means "per scan".
    pub ntime: Option<f64>,
    pub combinescans: Option<bool>,
    pub expression: Option<String>,
    pub datacolumn: Option<String>,
    pub timecutoff: Option<f64>,
    pub freqcutoff: Option<f64>,
    pub timefit: Option<String>,
    pub freqfit: Option<String>,
    pub maxnpieces: Option<i64>,
    pub flagdimension: Option<String>,
    pub usewindowstats: Option<String>,
    pub halfwin: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendParams {
    /// Seconds; 0 means "per scan".
    pub ntime: Option<f64>,
    pub combinescans: Option<bool>,
    pub extendpols: Option<bool>,
    pub growtime: Option<f64>,
    pub growfreq: Option<f64>,
    pub growaround: Option<bool>,
    pub flagneartime: Option<bool>,
    pub flagnearfreq: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RflagParams {
    pub timedev: Option<String>,
    pub freqdev: Option<String>,
    pub timedevscale: Option<f64>,
    pub freqdevscale: Option<f64>,
    pub spectralmax: Option<f64>,
    pub spectralmin: Option<f64>,
    pub extendflags: Option<bool>,
    pub winsize: Option<i64>,
    /// Seconds; 0 means "per scan".
    pub ntime: Option<f64>,
    pub combinescans: Option<bool>,
    pub datacolumn: Option<String>,
}

/// The typed parameters of one agent. The variant decides the mode.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeParams {
    Manual,
    Unflag,
    Clip(ClipParams),
    Quack(QuackParams),
    Shadow(ShadowParams),
    Elevation(ElevationParams),
    Tfcrop(TfcropParams),
    Extend(ExtendParams),
    Rflag(RflagParams),
}

/// A single typed parameter value, for engines that want a flat view.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Float(f64),
    Int(i64),
    Bool(bool),
    Range(f64, f64),
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "'{s}'"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Range(min, max) => write!(f, "[{min},{max}]"),
        }
    }
}

impl ModeParams {
    /// Pick out the parameters `mode` understands from `pairs` and give them
    /// their proper types. Parameters outside the mode's whitelist are
    /// ignored.
    pub fn coerce(mode: FlagMode, pairs: &[(String, String)]) -> Result<ModeParams, CoercionError> {
        let whitelist = mode.agent_mode().whitelist();
        let mut params = match mode.agent_mode() {
            FlagMode::Manual | FlagMode::Online => ModeParams::Manual,
            FlagMode::Unflag => ModeParams::Unflag,
            FlagMode::Clip => ModeParams::Clip(ClipParams::default()),
            FlagMode::Quack => ModeParams::Quack(QuackParams::default()),
            FlagMode::Shadow => ModeParams::Shadow(ShadowParams::default()),
            FlagMode::Elevation => ModeParams::Elevation(ElevationParams::default()),
            FlagMode::Tfcrop => ModeParams::Tfcrop(TfcropParams::default()),
            FlagMode::Extend => ModeParams::Extend(ExtendParams::default()),
            FlagMode::Rflag => ModeParams::Rflag(RflagParams::default()),
        };

        for (key, value) in pairs {
            let (key, value) = (key.as_str(), value.as_str());
            if !whitelist.contains(&key) {
                trace!("Ignoring parameter '{key}' for mode {mode}");
                continue;
            }

            match (&mut params, key) {
                (ModeParams::Clip(p), "clipminmax") => p.clipminmax = Some(to_range(key, value)?),
                (ModeParams::Clip(p), "expression") => p.expression = Some(value.to_string()),
                (ModeParams::Clip(p), "clipoutside") => p.clipoutside = Some(to_bool(key, value)?),
                (ModeParams::Clip(p), "datacolumn") => p.datacolumn = Some(value.to_string()),
                (ModeParams::Clip(p), "channelavg") => p.channelavg = Some(to_bool(key, value)?),
                (ModeParams::Clip(p), "clipzeros") => p.clipzeros = Some(to_bool(key, value)?),

                (ModeParams::Quack(p), "quackinterval") => {
                    p.quackinterval = Some(to_float(key, value)?)
                }
                (ModeParams::Quack(p), "quackmode") => p.quackmode = Some(value.parse()?),
                (ModeParams::Quack(p), "quackincrement") => {
                    p.quackincrement = Some(to_bool(key, value)?)
                }

                (ModeParams::Shadow(p), "diameter") => p.diameter = Some(to_float(key, value)?),

                (ModeParams::Elevation(p), "lowerlimit") => {
                    p.lowerlimit = Some(to_float(key, value)?)
                }
                (ModeParams::Elevation(p), "upperlimit") => {
                    p.upperlimit = Some(to_float(key, value)?)
                }

                (ModeParams::Tfcrop(p), "ntime") => p.ntime = Some(to_ntime(value)),
                (ModeParams::Tfcrop(p), "combinescans") => {
                    p.combinescans = Some(to_bool(key, value)?)
                }
                (ModeParams::Tfcrop(p), "expression") => p.expression = Some(value.to_string()),
                (ModeParams::Tfcrop(p), "datacolumn") => p.datacolumn = Some(value.to_string()),
                (ModeParams::Tfcrop(p), "timecutoff") => {
                    p.timecutoff = Some(to_float(key, value)?)
                }
                (ModeParams::Tfcrop(p), "freqcutoff") => {
                    p.freqcutoff = Some(to_float(key, value)?)
                }
                (ModeParams::Tfcrop(p), "timefit") => p.timefit = Some(value.to_string()),
                (ModeParams::Tfcrop(p), "freqfit") => p.freqfit = Some(value.to_string()),
                (ModeParams::Tfcrop(p), "maxnpieces") => p.maxnpieces = Some(to_int(key, value)?),
                (ModeParams::Tfcrop(p), "flagdimension") => {
                    p.flagdimension = Some(value.to_string())
                }
                (ModeParams::Tfcrop(p), "usewindowstats") => {
                    p.usewindowstats = Some(value.to_string())
                }
                (ModeParams::Tfcrop(p), "halfwin") => p.halfwin = Some(to_int(key, value)?),

                (ModeParams::Extend(p), "ntime") => p.ntime = Some(to_ntime(value)),
                (ModeParams::Extend(p), "combinescans") => {
                    p.combinescans = Some(to_bool(key, value)?)
                }
                (ModeParams::Extend(p), "extendpols") => p.extendpols = Some(to_bool(key, value)?),
                (ModeParams::Extend(p), "growtime") => p.growtime = Some(to_float(key, value)?),
                (ModeParams::Extend(p), "growfreq") => p.growfreq = Some(to_float(key, value)?),
                (ModeParams::Extend(p), "growaround") => p.growaround = Some(to_bool(key, value)?),
                (ModeParams::Extend(p), "flagneartime") => {
                    p.flagneartime = Some(to_bool(key, value)?)
                }
                (ModeParams::Extend(p), "flagnearfreq") => {
                    p.flagnearfreq = Some(to_bool(key, value)?)
                }

                (ModeParams::Rflag(p), "timedev") => p.timedev = Some(value.to_string()),
                (ModeParams::Rflag(p), "freqdev") => p.freqdev = Some(value.to_string()),
                (ModeParams::Rflag(p), "timedevscale") => {
                    p.timedevscale = Some(to_float(key, value)?)
                }
                (ModeParams::Rflag(p), "freqdevscale") => {
                    p.freqdevscale = Some(to_float(key, value)?)
                }
                (ModeParams::Rflag(p), "spectralmax") => {
                    p.spectralmax = Some(to_float(key, value)?)
                }
                (ModeParams::Rflag(p), "spectralmin") => {
                    p.spectralmin = Some(to_float(key, value)?)
                }
                (ModeParams::Rflag(p), "extendflags") => {
                    p.extendflags = Some(to_bool(key, value)?)
                }
                (ModeParams::Rflag(p), "winsize") => p.winsize = Some(to_int(key, value)?),
                (ModeParams::Rflag(p), "ntime") => p.ntime = Some(to_ntime(value)),
                (ModeParams::Rflag(p), "combinescans") => {
                    p.combinescans = Some(to_bool(key, value)?)
                }
                (ModeParams::Rflag(p), "datacolumn") => p.datacolumn = Some(value.to_string()),

                _ => {
                    return Err(CoercionError::Unhandled {
                        mode,
                        key: key.to_string(),
                    })
                }
            }
        }

        Ok(params)
    }

    pub fn mode(&self) -> FlagMode {
        match self {
            ModeParams::Manual => FlagMode::Manual,
            ModeParams::Unflag => FlagMode::Unflag,
            ModeParams::Clip(_) => FlagMode::Clip,
            ModeParams::Quack(_) => FlagMode::Quack,
            ModeParams::Shadow(_) => FlagMode::Shadow,
            ModeParams::Elevation(_) => FlagMode::Elevation,
            ModeParams::Tfcrop(_) => FlagMode::Tfcrop,
            ModeParams::Extend(_) => FlagMode::Extend,
            ModeParams::Rflag(_) => FlagMode::Rflag,
        }
    }

    /// The parameters that were set, flattened into name/value pairs.
    pub fn to_pairs(&self) -> Vec<(&'static str, ParamValue)> {
        use ParamValue::*;

        fn push<T>(
            out: &mut Vec<(&'static str, ParamValue)>,
            key: &'static str,
            value: &Option<T>,
            f: impl Fn(&T) -> ParamValue,
        ) {
            if let Some(v) = value {
                out.push((key, f(v)));
            }
        }
        let text = |s: &String| Text(s.clone());
        let float = |v: &f64| Float(*v);
        let int = |v: &i64| Int(*v);
        let boolean = |v: &bool| Bool(*v);

        let mut out = vec![];
        match self {
            ModeParams::Manual | ModeParams::Unflag => (),
            ModeParams::Clip(p) => {
                push(&mut out, "clipminmax", &p.clipminmax, |(a, b)| Range(*a, *b));
                push(&mut out, "expression", &p.expression, text);
                push(&mut out, "clipoutside", &p.clipoutside, boolean);
                push(&mut out, "datacolumn", &p.datacolumn, text);
                push(&mut out, "channelavg", &p.channelavg, boolean);
                push(&mut out, "clipzeros", &p.clipzeros, boolean);
            }
            ModeParams::Quack(p) => {
                push(&mut out, "quackinterval", &p.quackinterval, float);
                push(&mut out, "quackmode", &p.quackmode, |m| {
                    Text(m.as_str().to_string())
                });
                push(&mut out, "quackincrement", &p.quackincrement, boolean);
            }
            ModeParams::Shadow(p) => push(&mut out, "diameter", &p.diameter, float),
            ModeParams::Elevation(p) => {
                push(&mut out, "lowerlimit", &p.lowerlimit, float);
                push(&mut out, "upperlimit", &p.upperlimit, float);
            }
            ModeParams::Tfcrop(p) => {
                push(&mut out, "ntime", &p.ntime, float);
                push(&mut out, "combinescans", &p.combinescans, boolean);
                push(&mut out, "expression", &p.expression, text);
                push(&mut out, "datacolumn", &p.datacolumn, text);
                push(&mut out, "timecutoff", &p.timecutoff, float);
                push(&mut out, "freqcutoff", &p.freqcutoff, float);
                push(&mut out, "timefit", &p.timefit, text);
                push(&mut out, "freqfit", &p.freqfit, text);
                push(&mut out, "maxnpieces", &p.maxnpieces, int);
                push(&mut out, "flagdimension", &p.flagdimension, text);
                push(&mut out, "usewindowstats", &p.usewindowstats, text);
                push(&mut out, "halfwin", &p.halfwin, int);
            }
            ModeParams::Extend(p) => {
                push(&mut out, "ntime", &p.ntime, float);
                push(&mut out, "combinescans", &p.combinescans, boolean);
                push(&mut out, "extendpols", &p.extendpols, boolean);
                push(&mut out, "growtime", &p.growtime, float);
                push(&mut out, "growfreq", &p.growfreq, float);
                push(&mut out, "growaround", &p.growaround, boolean);
                push(&mut out, "flagneartime", &p.flagneartime, boolean);
                push(&mut out, "flagnearfreq", &p.flagnearfreq, boolean);
            }
            ModeParams::Rflag(p) => {
                push(&mut out, "timedev", &p.timedev, text);
                push(&mut out, "freqdev", &p.freqdev, text);
                push(&mut out, "timedevscale", &p.timedevscale, float);
                push(&mut out, "freqdevscale", &p.freqdevscale, float);
                push(&mut out, "spectralmax", &p.spectralmax, float);
                push(&mut out, "spectralmin", &p.spectralmin, float);
                push(&mut out, "extendflags", &p.extendflags, boolean);
                push(&mut out, "winsize", &p.winsize, int);
                push(&mut out, "ntime", &p.ntime, float);
                push(&mut out, "combinescans", &p.combinescans, boolean);
                push(&mut out, "datacolumn", &p.datacolumn, text);
            }
        }
        out
    }
}

fn to_float(key: &str, value: &str) -> Result<f64, CoercionError> {
    value.trim().parse().map_err(|_| CoercionError::NotFloat {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn to_int(key: &str, value: &str) -> Result<i64, CoercionError> {
    value.trim().parse().map_err(|_| CoercionError::NotInteger {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Only explicit literals are booleans; nothing is evaluated.
fn to_bool(key: &str, value: &str) -> Result<bool, CoercionError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Ok(true),
        "false" | "f" | "0" => Ok(false),
        _ => Err(CoercionError::NotBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// "[min,max]" -> (min, max). The order is not changed.
fn to_range(key: &str, value: &str) -> Result<(f64, f64), CoercionError> {
    let err = || CoercionError::NotRange {
        key: key.to_string(),
        value: value.to_string(),
    };
    let inner = value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    let (min, max) = inner.split_once(',').ok_or_else(err)?;
    let min = min.trim().parse().map_err(|_| err())?;
    let max = max.trim().parse().map_err(|_| err())?;
    Ok((min, max))
}

/// `ntime` is seconds, "scan" (0, meaning per scan), or a quantity with a time
/// unit. Anything else falls back to 0.
fn to_ntime(value: &str) -> f64 {
    if value == "scan" {
        return 0.0;
    }
    match quantity_to_seconds(value) {
        Ok(seconds) => seconds,
        Err(e) => {
            warn!("Cannot convert units of ntime ({e}). Will use default 0.0s");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(p: &[(&str, &str)]) -> Vec<(String, String)> {
        p.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_mode_names() {
        for mode in [
            FlagMode::Manual,
            FlagMode::Clip,
            FlagMode::Quack,
            FlagMode::Shadow,
            FlagMode::Elevation,
            FlagMode::Tfcrop,
            FlagMode::Extend,
            FlagMode::Rflag,
            FlagMode::Unflag,
            FlagMode::Online,
        ] {
            assert_eq!(mode.as_str().parse::<FlagMode>(), Ok(mode));
        }
        assert_eq!("QUACK".parse::<FlagMode>(), Ok(FlagMode::Quack));
        assert!("sideways".parse::<FlagMode>().is_err());
        assert_eq!(FlagMode::Tfcrop.capitalised(), "Tfcrop");
    }

    #[test]
    fn test_every_whitelisted_parameter_is_handled() {
        for mode in [
            FlagMode::Manual,
            FlagMode::Clip,
            FlagMode::Quack,
            FlagMode::Shadow,
            FlagMode::Elevation,
            FlagMode::Tfcrop,
            FlagMode::Extend,
            FlagMode::Rflag,
            FlagMode::Unflag,
            FlagMode::Online,
        ] {
            for key in mode.agent_mode().whitelist() {
                // The value may well be wrong for the key; only an unhandled
                // key is of interest here.
                let result = ModeParams::coerce(mode, &pairs(&[(*key, "1")]));
                assert!(
                    !matches!(result, Err(CoercionError::Unhandled { .. })),
                    "{mode} {key}"
                );
            }
        }
    }

    #[test]
    fn test_illegal_quackmode() {
        let result = ModeParams::coerce(FlagMode::Quack, &pairs(&[("quackmode", "sideways")]));
        assert_eq!(
            result,
            Err(CoercionError::QuackMode("sideways".to_string()))
        );
    }

    #[test]
    fn test_quack() {
        let params = ModeParams::coerce(
            FlagMode::Quack,
            &pairs(&[
                ("quackmode", "endb"),
                ("quackinterval", "-2.5"),
                ("quackincrement", "FALSE"),
            ]),
        )
        .unwrap();
        assert_eq!(
            params,
            ModeParams::Quack(QuackParams {
                quackinterval: Some(-2.5),
                quackmode: Some(QuackMode::Endb),
                quackincrement: Some(false),
            })
        );
    }

    #[test]
    fn test_clipminmax_keeps_order() {
        let params =
            ModeParams::coerce(FlagMode::Clip, &pairs(&[("clipminmax", "[10.0, 2]")])).unwrap();
        match params {
            ModeParams::Clip(p) => assert_eq!(p.clipminmax, Some((10.0, 2.0))),
            _ => panic!("expected clip parameters"),
        }

        assert!(matches!(
            ModeParams::coerce(FlagMode::Clip, &pairs(&[("clipminmax", "[10.0]")])),
            Err(CoercionError::NotRange { .. })
        ));
    }

    #[test]
    fn test_booleans_are_literals_only() {
        let params = ModeParams::coerce(
            FlagMode::Extend,
            &pairs(&[("extendpols", "True"), ("growaround", "false")]),
        )
        .unwrap();
        match params {
            ModeParams::Extend(p) => {
                assert_eq!(p.extendpols, Some(true));
                assert_eq!(p.growaround, Some(false));
            }
            _ => panic!("expected extend parameters"),
        }

        assert!(matches!(
            ModeParams::coerce(FlagMode::Clip, &pairs(&[("clipzeros", "1+1")])),
            Err(CoercionError::NotBool { .. })
        ));
    }

    #[test]
    fn test_numbers() {
        let params = ModeParams::coerce(
            FlagMode::Tfcrop,
            &pairs(&[
                ("timecutoff", "4.0"),
                ("maxnpieces", "7"),
                ("halfwin", "1"),
            ]),
        )
        .unwrap();
        match params {
            ModeParams::Tfcrop(p) => {
                assert_eq!(p.timecutoff, Some(4.0));
                assert_eq!(p.maxnpieces, Some(7));
                assert_eq!(p.halfwin, Some(1));
            }
            _ => panic!("expected tfcrop parameters"),
        }

        assert!(matches!(
            ModeParams::coerce(FlagMode::Tfcrop, &pairs(&[("maxnpieces", "7.5")])),
            Err(CoercionError::NotInteger { .. })
        ));
        assert!(matches!(
            ModeParams::coerce(FlagMode::Shadow, &pairs(&[("diameter", "big")])),
            Err(CoercionError::NotFloat { .. })
        ));
    }

    #[test]
    fn test_ntime() {
        assert_eq!(to_ntime("scan"), 0.0);
        assert_eq!(to_ntime("2min"), 120.0);
        assert_eq!(to_ntime("30"), 30.0);
        assert_eq!(to_ntime("4Jy"), 0.0);
    }

    #[test]
    fn test_non_whitelisted_keys_are_ignored() {
        // quackmode isn't a shadow parameter, so its bad value doesn't matter.
        let params = ModeParams::coerce(
            FlagMode::Shadow,
            &pairs(&[("quackmode", "sideways"), ("diameter", "12")]),
        )
        .unwrap();
        assert_eq!(
            params,
            ModeParams::Shadow(ShadowParams {
                diameter: Some(12.0)
            })
        );

        let params = ModeParams::coerce(FlagMode::Online, &pairs(&[("diameter", "12")])).unwrap();
        assert_eq!(params, ModeParams::Manual);
    }

    #[test]
    fn test_to_pairs() {
        let params = ModeParams::coerce(
            FlagMode::Clip,
            &pairs(&[("clipminmax", "[0,5]"), ("clipoutside", "true")]),
        )
        .unwrap();
        assert_eq!(
            params.to_pairs(),
            vec![
                ("clipminmax", ParamValue::Range(0.0, 5.0)),
                ("clipoutside", ParamValue::Bool(true)),
            ]
        );
        assert!(ModeParams::Manual.to_pairs().is_empty());
    }
}
