/// Input line parsing: turn one shell line into a [`CommandInput`].
///
/// `name pos1 pos2 --flag --key value --key=value -abc -k=value -- rest...`
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Number, Value};

use crate::types::CommandInput;

static BARE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_\-]*)\s*:"#).expect("bare key pattern is valid")
});

static BARE_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#":\s*([A-Za-z_][A-Za-z0-9_./\-]*)\s*([,}])"#)
        .expect("bare value pattern is valid")
});

/// Parse a line. Returns `None` for blank lines and comment-only lines.
pub fn detect_command(line: &str) -> Option<CommandInput> {
    let stripped = strip_comment(line);
    let tokens = split_words(&stripped)
        .unwrap_or_else(|| stripped.split_whitespace().map(str::to_string).collect());
    let (name, rest) = tokens.split_first()?;

    let mut input = CommandInput::new(name.clone(), Vec::new());
    input.raw = line.trim().to_string();

    let mut i = 0;
    while i < rest.len() {
        let token = &rest[i];
        if token == "--" {
            input.args.extend(rest[i + 1..].iter().cloned());
            break;
        }

        if let Some(body) = token.strip_prefix("--") {
            if let Some((key, value)) = body.split_once('=') {
                input.options.insert(key.to_string(), convert_value(value));
            } else if let Some(next) = rest.get(i + 1).filter(|n| !n.starts_with('-')) {
                input.options.insert(body.to_string(), convert_value(next));
                i += 1;
            } else {
                input.flags.insert(body.to_string());
            }
        } else if is_short_option(token) {
            let body = &token[1..];
            if let Some((key, value)) = body.split_once('=') {
                input.options.insert(key.to_string(), convert_value(value));
            } else {
                input.flags.extend(body.chars().map(String::from));
            }
        } else {
            input.args.push(token.clone());
        }
        i += 1;
    }

    Some(input)
}

// Negative numbers stay positional.
fn is_short_option(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && token[1..].parse::<f64>().is_err()
}

/// Drop a `#` comment that starts outside quotes.
pub fn strip_comment(line: &str) -> String {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev_space = true;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && quote != Some('\'') {
            escaped = true;
        } else if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
        } else if c == '#' && prev_space {
            return line[..idx].trim_end().to_string();
        }
        prev_space = c.is_whitespace();
    }
    line.trim().to_string()
}

/// POSIX-style word splitting. `None` on an unterminated quote or a
/// trailing escape.
pub fn split_words(line: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '\'' => break,
                        ch => current.push(ch),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => match chars.next()? {
                            ch @ ('"' | '\\' | '$' | '`') => current.push(ch),
                            ch => {
                                current.push('\\');
                                current.push(ch);
                            }
                        },
                        ch => current.push(ch),
                    }
                }
            }
            '\\' => {
                in_word = true;
                current.push(chars.next()?);
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Some(words)
}

/// Interpret an option value: booleans, null, numbers, JSON arrays and
/// objects, otherwise a string with surrounding quotes removed.
pub fn convert_value(raw: &str) -> Value {
    let value = raw.trim();
    match value.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "none" | "null" => return Value::Null,
        _ => {}
    }

    if value.contains('.') {
        if let Some(n) = value.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    } else if let Ok(n) = value.parse::<i64>() {
        return Value::Number(n.into());
    }

    if value.starts_with('{') && value.ends_with('}') {
        if let Ok(obj @ Value::Object(_)) = serde_json::from_str(value) {
            return obj;
        }
        if !value.contains('"') {
            if let Ok(obj @ Value::Object(_)) = serde_json::from_str(&quote_bare_json(value)) {
                return obj;
            }
        }
    }

    if value.starts_with('[') && value.ends_with(']') {
        if let Ok(arr @ Value::Array(_)) = serde_json::from_str(value) {
            return arr;
        }
    }

    match strip_quotes(value) {
        inner if inner.len() < value.len() => Value::String(inner.to_string()),
        _ => Value::String(raw.to_string()),
    }
}

fn quote_bare_json(value: &str) -> String {
    let keyed = BARE_KEY.replace_all(value, r#"$1"$2":"#);
    BARE_VALUE
        .replace_all(&keyed, |caps: &Captures| {
            let word = &caps[1];
            match word {
                "true" | "false" | "null" => format!(": {}{}", word, &caps[2]),
                _ => format!(": \"{}\"{}", word, &caps[2]),
            }
        })
        .into_owned()
}

fn strip_quotes(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_and_comment_lines() {
        assert!(detect_command("").is_none());
        assert!(detect_command("   ").is_none());
        assert!(detect_command("# just a note").is_none());
    }

    #[test]
    fn test_positional_and_options() {
        let input = detect_command("run sleep 5 --timeout 1.5 --cwd=/tmp -v").unwrap();
        assert_eq!(input.name, "run");
        assert_eq!(input.args, vec!["sleep", "5"]);
        assert_eq!(input.option("timeout"), Some(&json!(1.5)));
        assert_eq!(input.option_str("cwd").as_deref(), Some("/tmp"));
        assert!(input.flag("v"));
    }

    #[test]
    fn test_flag_before_another_option() {
        let input = detect_command("plugins list --all --format table").unwrap();
        assert!(input.flag("all"));
        assert_eq!(input.option_str("format").as_deref(), Some("table"));
        assert_eq!(input.args, vec!["list"]);
    }

    #[test]
    fn test_combined_short_flags_and_short_option() {
        let input = detect_command("ls -la -n=3").unwrap();
        assert!(input.flag("l") && input.flag("a"));
        assert_eq!(input.option("n"), Some(&json!(3)));
    }

    #[test]
    fn test_double_dash_ends_options() {
        let input = detect_command("run -- sh -c 'echo hi'").unwrap();
        assert_eq!(input.args, vec!["sh", "-c", "echo hi"]);
        assert!(input.flags.is_empty());
    }

    #[test]
    fn test_negative_number_is_positional() {
        let input = detect_command("calc -5 2").unwrap();
        assert_eq!(input.args, vec!["-5", "2"]);
    }

    #[test]
    fn test_quotes_and_comments() {
        let input = detect_command(r#"settings set ui.prompt "sf # > " # trailing"#).unwrap();
        assert_eq!(input.args, vec!["set", "ui.prompt", "sf # > "]);
    }

    #[test]
    fn test_unterminated_quote_falls_back_to_whitespace() {
        let input = detect_command("echo 'unterminated value").unwrap();
        assert_eq!(input.args, vec!["'unterminated", "value"]);
    }

    #[test]
    fn test_convert_value() {
        assert_eq!(convert_value("TRUE"), json!(true));
        assert_eq!(convert_value("none"), Value::Null);
        assert_eq!(convert_value("42"), json!(42));
        assert_eq!(convert_value("2.5"), json!(2.5));
        assert_eq!(convert_value("1.2.3"), json!("1.2.3"));
        assert_eq!(convert_value("[1, 2]"), json!([1, 2]));
        assert_eq!(convert_value(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(convert_value("{a: 1, b: hello}"), json!({"a": 1, "b": "hello"}));
        assert_eq!(convert_value("'quoted'"), json!("quoted"));
        assert_eq!(convert_value("sf> "), json!("sf> "));
    }
}
