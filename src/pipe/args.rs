use std::collections::BTreeMap;
use std::fmt::Write;

use crate::{BundleError, Result};

/// Parsed pipeline arguments, keyed by option name with `-` normalised to `_`
///
/// Values are kept as written. Typed helpers read and write the python-literal forms the
/// pipeline understands: `True`/`False`, lists like `['H1', 'L1']` and dicts like
/// `{'H1': '/psd/h1.txt'}`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineArgs {
    values: BTreeMap<String, String>,
}

impl PipelineArgs {
    /// Parse ini text. `[section]` headers and `#`/`;` comments are ignored. A value opening a
    /// `{` or `[` continues over following lines until its brackets balance.
    pub fn parse(ini: &str) -> Result<PipelineArgs> {
        let mut args = PipelineArgs::default();
        let mut lines = ini.lines().enumerate();
        while let Some((number, line)) = lines.next() {
            let line = line.trim();
            if line.is_empty()
                || line.starts_with('#')
                || line.starts_with(';')
                || line.starts_with('[')
            {
                continue;
            }
            let (key, value) = split_option(line).ok_or_else(|| {
                let number = number + 1;
                BundleError::Ini(format!("line {number}: expected `key = value`, got {line:?}"))
            })?;

            let mut value = value.to_string();
            while bracket_depth(&value) > 0 {
                match lines.next() {
                    Some((_, next)) => {
                        value.push(' ');
                        value.push_str(next.trim());
                    }
                    None => {
                        return Err(BundleError::Ini(format!("unterminated value for {key}")));
                    }
                }
            }
            args.set(key, value);
        }
        Ok(args)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&normalise_key(key))
            .map(String::as_str)
            .filter(|value| !value.is_empty() && *value != "None")
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalise_key(key), value.into());
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, if value { "True" } else { "False" });
    }

    /// Read a list written as `['a', 'b']`, `[a, b]` or `a b`
    pub fn get_list(&self, key: &str) -> Vec<String> {
        let Some(value) = self.get(key) else { return Vec::new() };
        let inner = value.trim().trim_start_matches('[').trim_end_matches(']');
        inner
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(unquote)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn set_list(&mut self, key: &str, items: &[String]) {
        let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
        self.set(key, format!("[{}]", quoted.join(", ")));
    }

    /// Read a dict written as `{key: value, 'key': 'value'}`. An absent value is an empty dict.
    pub fn get_dict(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let mut dict = BTreeMap::new();
        let Some(value) = self.get(key) else { return Ok(dict) };
        let inner = value
            .trim()
            .strip_prefix('{')
            .and_then(|v| v.strip_suffix('}'))
            .ok_or_else(|| BundleError::Ini(format!("{key} is not a dict: {value}")))?;
        for entry in split_top_level(inner) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (k, v) = entry
                .split_once(':')
                .or_else(|| entry.split_once('='))
                .ok_or_else(|| BundleError::Ini(format!("{key} has a malformed entry: {entry}")))?;
            dict.insert(unquote(k).to_string(), unquote(v).to_string());
        }
        Ok(dict)
    }

    pub fn set_dict(&mut self, key: &str, dict: &BTreeMap<String, String>) {
        let entries: Vec<String> = dict.iter().map(|(k, v)| format!("'{k}': '{v}'")).collect();
        self.set(key, format!("{{{}}}", entries.join(", ")));
    }

    /// Serialise as `key=value` lines
    pub fn to_ini_string(&self) -> String {
        let mut ini = String::new();
        for (key, value) in &self.values {
            // writing to a String can't fail
            let _ = writeln!(ini, "{key}={value}");
        }
        ini
    }
}

fn normalise_key(key: &str) -> String {
    key.trim().replace('-', "_")
}

/// Split `key = value` or `key: value` at whichever separator comes first
fn split_option(line: &str) -> Option<(&str, &str)> {
    let separator = match (line.find('='), line.find(':')) {
        (Some(eq), Some(colon)) => eq.min(colon),
        (Some(separator), None) | (None, Some(separator)) => separator,
        (None, None) => return None,
    };
    let key = line[..separator].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, line[separator + 1..].trim()))
}

fn bracket_depth(value: &str) -> i32 {
    value.chars().fold(0, |depth, c| match c {
        '{' | '[' | '(' => depth + 1,
        '}' | ']' | ')' => depth - 1,
        _ => depth,
    })
}

/// Split on commas that are not nested inside brackets
fn split_top_level(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '\'' || c == '"')
}
