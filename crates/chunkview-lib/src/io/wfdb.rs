use crate::annotations::Annotation;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const SKIP: u8 = 59;
const AUX: u8 = 63;

/// Simple WFDB annotation entry.
#[derive(Debug, Clone)]
pub struct WfdbAnnotation {
    pub sample: usize,
    pub code: u8,
    /// Auxiliary string, e.g. a rhythm label such as `(AFIB`.
    pub aux: Option<String>,
}

impl WfdbAnnotation {
    pub fn is_beat(&self) -> bool {
        self.code > 0 && self.code < 59
    }

    /// Standard mnemonic for the annotation code.
    pub fn mnemonic(&self) -> &'static str {
        match self.code {
            1 => "N",
            2 => "L",
            3 => "R",
            4 => "a",
            5 => "V",
            6 => "F",
            7 => "J",
            8 => "A",
            9 => "S",
            10 => "E",
            11 => "j",
            12 => "/",
            13 => "Q",
            14 => "~",
            16 => "|",
            18 => "s",
            19 => "T",
            20 => "*",
            21 => "D",
            22 => "\"",
            23 => "=",
            24 => "p",
            25 => "B",
            26 => "^",
            27 => "t",
            28 => "+",
            29 => "u",
            30 => "?",
            31 => "!",
            32 => "[",
            33 => "]",
            34 => "e",
            35 => "n",
            36 => "@",
            37 => "x",
            38 => "f",
            39 => "(",
            40 => ")",
            41 => "r",
            _ => "?",
        }
    }

    /// Display text: the aux string when present, else the mnemonic.
    pub fn label(&self) -> String {
        match &self.aux {
            Some(aux) => aux.clone(),
            None => self.mnemonic().to_string(),
        }
    }
}

/// Parse MIT annotation binary stream into samples, codes and aux strings.
pub fn parse_wfdb_annotations(buf: &[u8]) -> Vec<WfdbAnnotation> {
    let mut out: Vec<WfdbAnnotation> = Vec::new();
    let mut idx = 0;
    let mut sample: usize = 0;
    while idx + 2 <= buf.len() {
        let word = u16::from_le_bytes([buf[idx], buf[idx + 1]]);
        idx += 2;
        let code = (word >> 10) as u8;
        let diff = (word & 0x03FF) as usize;
        if code == 0 && diff == 0 {
            break;
        }
        match code {
            SKIP => {
                if idx + 4 > buf.len() {
                    break;
                }
                let high = u16::from_le_bytes([buf[idx], buf[idx + 1]]) as u32;
                let low = u16::from_le_bytes([buf[idx + 2], buf[idx + 3]]) as u32;
                idx += 4;
                let skip = (high << 16) | low;
                sample = sample.wrapping_add(skip as usize);
            }
            60..=62 => {
                // NUM/SUB/CHN: payload not used
                sample = sample.wrapping_add(diff);
            }
            AUX => {
                let end = (idx + diff).min(buf.len());
                let text = String::from_utf8_lossy(&buf[idx..end])
                    .trim_matches(char::from(0))
                    .trim()
                    .to_string();
                if let Some(last) = out.last_mut() {
                    if !text.is_empty() {
                        last.aux = Some(text);
                    }
                }
                idx = end;
                if diff % 2 != 0 && idx < buf.len() {
                    idx += 1;
                }
            }
            _ => {
                sample = sample.wrapping_add(diff);
                out.push(WfdbAnnotation {
                    sample,
                    code,
                    aux: None,
                });
            }
        }
    }
    out
}

/// Read a WFDB annotation file (e.g. `.atr`) as annotations on `file_path`.
pub fn load_wfdb_annotations(path: &Path, file_path: &str) -> Result<Vec<Annotation>> {
    let buf = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_wfdb_annotations(&buf)
        .into_iter()
        .enumerate()
        .map(|(n, ann)| Annotation {
            id: format!("atr-{}", n + 1),
            file_path: file_path.to_string(),
            start_time: ann.sample,
            end_time: None,
            text: ann.label(),
            channel: None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> Vec<u8> {
        let mut bytes = vec![];
        // code 1, diff 5 -> sample 5
        bytes.extend(&((1u16 << 10) | 5u16).to_le_bytes());
        // code 5, diff 10 -> sample 15
        bytes.extend(&((5u16 << 10) | 10u16).to_le_bytes());
        // skip 5000 samples
        bytes.extend(&(59u16 << 10).to_le_bytes());
        bytes.extend(&0x0000u16.to_le_bytes());
        bytes.extend(&0x1388u16.to_le_bytes());
        // rhythm change at +3 with aux "(AFIB" (odd length, padded)
        bytes.extend(&((28u16 << 10) | 3u16).to_le_bytes());
        bytes.extend(&((63u16 << 10) | 5u16).to_le_bytes());
        bytes.extend(b"(AFIB\0");
        bytes.extend(&0u16.to_le_bytes());
        bytes
    }

    #[test]
    fn parses_simple_annotation_stream() {
        let annotations = parse_wfdb_annotations(&stream());
        assert_eq!(annotations.len(), 3);
        assert_eq!(annotations[0].sample, 5);
        assert_eq!(annotations[1].sample, 15);
        assert_eq!(annotations[1].mnemonic(), "V");
        assert_eq!(annotations[2].sample, 5018);
        assert_eq!(annotations[2].mnemonic(), "+");
        assert_eq!(annotations[2].aux.as_deref(), Some("(AFIB"));
    }

    #[test]
    fn loads_as_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("100.atr");
        std::fs::write(&path, stream()).unwrap();
        let annotations = load_wfdb_annotations(&path, "100.csv").unwrap();
        assert_eq!(annotations.len(), 3);
        assert_eq!(annotations[0].text, "N");
        assert_eq!(annotations[2].text, "(AFIB");
        assert_eq!(annotations[2].id, "atr-3");
        assert!(annotations.iter().all(|a| a.file_path == "100.csv"));
    }
}
