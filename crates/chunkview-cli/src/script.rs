use anyhow::{anyhow, bail, Context, Result};
use chunkview_lib::navigation::NavCommand;
use chunkview_lib::preprocess::{Normalization, PreprocessingConfig};

/// One parsed step of a `--script`, keeping its source text for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub text: String,
    pub command: NavCommand,
}

fn number<T: std::str::FromStr>(arg: Option<&str>, token: &str) -> Result<T> {
    let arg = arg.ok_or_else(|| anyhow!("'{token}' needs an argument"))?;
    arg.parse()
        .map_err(|_| anyhow!("'{token}': cannot parse '{arg}'"))
}

/// Parse a comma-separated navigation script such as
/// `next,zoom-in,pan:-2,jump:5,window:1:3,normalize:zscore`.
///
/// Preprocessing tokens accumulate, so `highpass:1,notch:50` ends with both
/// filters active.
pub fn parse_script(script: &str) -> Result<Vec<Step>> {
    let mut preprocessing = PreprocessingConfig::default();
    let mut steps = Vec::new();
    for token in script.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (name, arg) = match token.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (token, None),
        };
        let command = match name {
            "next" => NavCommand::NextChunk,
            "prev" => NavCommand::PrevChunk,
            "jump" => NavCommand::JumpToChunk(number(arg, token)?),
            "time" => NavCommand::JumpToTime(number(arg, token)?),
            "zoom-in" => NavCommand::ZoomIn,
            "zoom-out" => NavCommand::ZoomOut,
            "reset" => NavCommand::ResetView,
            "retry" => NavCommand::Retry,
            "pan" => NavCommand::Pan(number(arg, token)?),
            "zoom" => {
                let (factor, focus) = arg
                    .and_then(|arg| arg.split_once('@'))
                    .ok_or_else(|| anyhow!("'{token}' must look like zoom:FACTOR@SECONDS"))?;
                NavCommand::Zoom {
                    factor: number(Some(factor), token)?,
                    focus: number(Some(focus), token)?,
                }
            }
            "window" => {
                let (start, end) = arg
                    .and_then(|arg| arg.split_once(':'))
                    .ok_or_else(|| anyhow!("'{token}' must look like window:START:END"))?;
                NavCommand::SetWindow {
                    start: number(Some(start), token)?,
                    end: number(Some(end), token)?,
                }
            }
            "chunk-seconds" => NavCommand::SetChunkSeconds(number(arg, token)?),
            "channels" => NavCommand::SelectChannels(
                arg.unwrap_or_default()
                    .split('+')
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            "highpass" | "lowpass" | "notch" | "outliers" | "smooth" | "normalize" => {
                match name {
                    "highpass" => preprocessing.highpass = Some(number(arg, token)?),
                    "lowpass" => preprocessing.lowpass = Some(number(arg, token)?),
                    "notch" => preprocessing.notch = Some(number(arg, token)?),
                    "outliers" => preprocessing.remove_outliers = true,
                    "smooth" => {
                        preprocessing.smoothing = true;
                        preprocessing.smoothing_window = number(arg, token)?;
                    }
                    _ => preprocessing.normalization = parse_normalization(arg.unwrap_or(""))?,
                }
                NavCommand::SetPreprocessing(preprocessing.clone())
            }
            "reset-preprocessing" => {
                preprocessing = PreprocessingConfig::default();
                NavCommand::ResetPreprocessing
            }
            other => bail!("unknown script command '{other}'"),
        };
        steps.push(Step {
            text: token.to_string(),
            command,
        });
    }
    Ok(steps)
}

pub fn parse_normalization(text: &str) -> Result<Normalization> {
    serde_json::from_value(serde_json::Value::String(text.to_ascii_lowercase()))
        .with_context(|| format!("normalization must be none, zscore or minmax (got '{text}')"))
}
