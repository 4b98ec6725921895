//! Interpreter for the narrow shell-like command language the model is allowed
//! to emit.
//!
//! Three forms are recognized:
//!
//! ```text
//! echo "<content>" > <path>      (single quotes also accepted)
//! touch <path>
//! mkdir <path>
//! ```
//!
//! Everything else, including pipes, `>>`, globs and `&&` chains, parses to
//! [`ParsedCommand::Unsupported`]. Parsing is pure: no I/O happens here.

/// A command string reduced to the file operation it asks for.
///
/// Paths are relative to the storage root and have already had one leading
/// storage-root segment stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    WriteFile { path: String, content: String },
    CreateEmptyFile { path: String },
    CreateDirectory { path: String },
    Unsupported { raw: String },
}

impl ParsedCommand {
    pub fn path(&self) -> Option<&str> {
        match self {
            ParsedCommand::WriteFile { path, .. }
            | ParsedCommand::CreateEmptyFile { path }
            | ParsedCommand::CreateDirectory { path } => Some(path),
            ParsedCommand::Unsupported { .. } => None,
        }
    }
}

/// Characters that would make a path argument look like a shell construct.
const SHELL_OPERATORS: &[char] = &['|', '&', ';', '<', '>', '*', '?', '`', '$'];

pub fn parse(raw: &str, root_name: &str) -> ParsedCommand {
    parse_recognized(raw, root_name).unwrap_or_else(|| ParsedCommand::Unsupported {
        raw: raw.to_string(),
    })
}

fn parse_recognized(raw: &str, root_name: &str) -> Option<ParsedCommand> {
    let trimmed = raw.trim();
    let split = trimmed.find(char::is_whitespace)?;
    let (head, rest) = trimmed.split_at(split);

    match head {
        "echo" => {
            let (content, path) = parse_echo_body(rest.trim_start())?;
            let path = path_argument(strip_quotes(path), root_name)?;
            Some(ParsedCommand::WriteFile {
                path,
                content: unescape(content),
            })
        }
        "touch" => {
            let path = path_argument(strip_quotes(rest.trim()), root_name)?;
            Some(ParsedCommand::CreateEmptyFile { path })
        }
        "mkdir" => {
            let unquoted = rest.replace('"', "");
            let path = path_argument(unquoted.trim(), root_name)?;
            Some(ParsedCommand::CreateDirectory { path })
        }
        _ => None,
    }
}

/// Splits `"<content>" > <path>` into its content and path.
///
/// The closing quote must match the opening one. Content is greedy: the
/// rightmost closing quote followed by a valid redirect wins, so content may
/// itself contain quotes and `>`.
fn parse_echo_body(body: &str) -> Option<(&str, &str)> {
    let quote = body.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = &body[quote.len_utf8()..];

    inner.rmatch_indices(quote).find_map(|(idx, q)| {
        let path = redirect_target(&inner[idx + q.len()..])?;
        Some((&inner[..idx], path))
    })
}

fn redirect_target(tail: &str) -> Option<&str> {
    let target = tail.trim_start().strip_prefix('>')?.trim();
    if target.is_empty() || target.starts_with('>') || target.contains(['\n', '\r']) {
        return None;
    }
    Some(target)
}

fn strip_quotes(path: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = path
            .strip_prefix(quote)
            .and_then(|p| p.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    path
}

fn path_argument(path: &str, root_name: &str) -> Option<String> {
    let path = strip_root_prefix(path, root_name);
    if path.is_empty() || path.contains(SHELL_OPERATORS) || path.contains(['\n', '\r']) {
        return None;
    }
    Some(path.to_string())
}

/// Removes exactly one leading `<root_name>/` (or `<root_name>\`) segment.
pub fn strip_root_prefix<'a>(path: &'a str, root_name: &str) -> &'a str {
    if root_name.is_empty() {
        return path;
    }
    match path.strip_prefix(root_name) {
        Some(rest) if rest.starts_with(['/', '\\']) => &rest[1..],
        _ => path,
    }
}

/// Applies the four escape substitutions as sequential passes, in this order.
/// The order is part of the wire contract with the model.
pub fn unescape(content: &str) -> String {
    content
        .replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\\", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "server";

    fn write(path: &str, content: &str) -> ParsedCommand {
        ParsedCommand::WriteFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn parses_double_quoted_echo() {
        assert_eq!(
            parse(r#"echo "<html></html>" > tea_site/index.html"#, ROOT),
            write("tea_site/index.html", "<html></html>")
        );
    }

    #[test]
    fn parses_single_quoted_echo_without_spaces_around_redirect() {
        assert_eq!(
            parse("echo 'body { color: red; }'>site/style.css", ROOT),
            write("site/style.css", "body { color: red; }")
        );
    }

    #[test]
    fn echo_content_is_greedy_up_to_last_redirect() {
        assert_eq!(
            parse(r#"echo "<p>a > b</p><a href="x">" > site/index.html"#, ROOT),
            write("site/index.html", r#"<p>a > b</p><a href="x">"#)
        );
    }

    #[test]
    fn echo_content_may_span_lines() {
        assert_eq!(
            parse("echo \"<html>\n<body></body>\n</html>\" > s/index.html", ROOT),
            write("s/index.html", "<html>\n<body></body>\n</html>")
        );
    }

    #[test]
    fn unescapes_in_fixed_order() {
        let cmd = r#"echo "say \"hi\"\nnext\tcol \\ end" > s/a.txt"#;
        assert_eq!(parse(cmd, ROOT), write("s/a.txt", "say \"hi\"\nnext\tcol \\ end"));
    }

    #[test]
    fn unescape_is_sequential_not_single_pass() {
        // The `\n` pass runs before the `\\` pass, so `\\n` yields a
        // backslash followed by a newline.
        assert_eq!(unescape(r"a\\nb"), "a\\\nb");
    }

    #[test]
    fn unescape_runs_only_once() {
        let once = unescape(r"x\\t");
        assert_eq!(once, "x\\\t");
        let cmd = format!("echo \"{}\" > s/a.txt", once);
        assert_eq!(parse(&cmd, ROOT), write("s/a.txt", &unescape(&once)));
        assert_eq!(unescape(&once), once);
    }

    #[test]
    fn mismatched_quotes_are_unsupported() {
        let raw = "echo \"hello' > s/a.txt";
        assert_eq!(
            parse(raw, ROOT),
            ParsedCommand::Unsupported { raw: raw.to_string() }
        );
    }

    #[test]
    fn append_redirect_is_unsupported() {
        let raw = r#"echo "x" >> s/a.txt"#;
        assert!(matches!(parse(raw, ROOT), ParsedCommand::Unsupported { .. }));
    }

    #[test]
    fn echo_without_redirect_is_unsupported() {
        assert!(matches!(parse(r#"echo "x""#, ROOT), ParsedCommand::Unsupported { .. }));
        assert!(matches!(parse(r#"echo "x" > "#, ROOT), ParsedCommand::Unsupported { .. }));
    }

    #[test]
    fn echo_quoted_path_is_unquoted() {
        assert_eq!(parse(r#"echo "x" > "s/a.txt""#, ROOT), write("s/a.txt", "x"));
    }

    #[test]
    fn parses_touch_and_mkdir() {
        assert_eq!(
            parse("touch tea_site/index.html", ROOT),
            ParsedCommand::CreateEmptyFile {
                path: "tea_site/index.html".to_string()
            }
        );
        assert_eq!(
            parse(r#"mkdir "tea_site" "#, ROOT),
            ParsedCommand::CreateDirectory {
                path: "tea_site".to_string()
            }
        );
    }

    #[test]
    fn strips_one_root_prefix() {
        assert_eq!(
            parse("mkdir server/tea_site", ROOT),
            ParsedCommand::CreateDirectory {
                path: "tea_site".to_string()
            }
        );
        assert_eq!(strip_root_prefix("server/server/a", ROOT), "server/a");
        assert_eq!(strip_root_prefix("server\\a", ROOT), "a");
        assert_eq!(strip_root_prefix("servers/a", ROOT), "servers/a");
    }

    #[test]
    fn rejects_shell_constructs() {
        for raw in [
            "rm -rf /",
            "ls",
            "mkdir a && rm b",
            "touch a | cat",
            "touch *.html",
            "cat index.html",
            "Touch a.html",
            "touch",
            "mkdir   ",
            "",
        ] {
            assert!(
                matches!(parse(raw, ROOT), ParsedCommand::Unsupported { .. }),
                "expected unsupported: {raw:?}"
            );
        }
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(
            parse("  \tmkdir   shop  \n", ROOT),
            ParsedCommand::CreateDirectory {
                path: "shop".to_string()
            }
        );
    }
}
