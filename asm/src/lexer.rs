/// One non-empty source line with its comment removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number in the original text.
    pub line_no: usize,
    pub raw: String,
    /// `raw` without its comment and surrounding blanks.
    pub text: String,
    pub tokens: Vec<String>,
}

impl SourceLine {
    pub fn is(&self, words: &[&str]) -> bool {
        self.tokens.len() == words.len() && self.tokens.iter().zip(words).all(|(a, b)| a == b)
    }
}

/// Cut the trailing `;` comment. A `;` inside a quoted string is kept.
pub fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (idx, c) in line.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ';') => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Split `text` into token lines, dropping blank and comment-only lines.
pub fn tokenize(text: &str) -> Vec<SourceLine> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let text = strip_comment(raw).trim();
            let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
            (!tokens.is_empty()).then(|| SourceLine {
                line_no: idx + 1,
                raw: raw.to_string(),
                text: text.to_string(),
                tokens,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments() {
        assert_eq!(strip_comment("mov eax, 1 ; set"), "mov eax, 1 ");
        assert_eq!(strip_comment("; whole line"), "");
        assert_eq!(strip_comment("$SG1 DB 'a;b', 00H ; str"), "$SG1 DB 'a;b', 00H ");
        assert_eq!(strip_comment("push eax"), "push eax");
    }

    #[test]
    fn lines() {
        let lines = tokenize("; header\n\n_TEXT SEGMENT\n  mov eax, 1 ; one\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_no, 3);
        assert!(lines[0].is(&["_TEXT", "SEGMENT"]));
        assert_eq!(lines[1].tokens, vec!["mov", "eax,", "1"]);
        assert_eq!(lines[1].raw, "  mov eax, 1 ; one");
        assert_eq!(lines[1].text, "mov eax, 1");

        let lines = tokenize("$SG1 DB 'a  b', 00H   ; two blanks\n");
        assert_eq!(lines[0].text, "$SG1 DB 'a  b', 00H");
    }
}
