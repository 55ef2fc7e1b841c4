use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a link")]
pub struct LinkError;

/// A `<url|text>` or `<text>` markup reference
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Link {
    pub text: String,
    /// Empty when the link had no pipe-delimited url
    pub url: String,
}

impl Link {
    pub fn url(&self) -> Option<&str> {
        (!self.url.is_empty()).then_some(self.url.as_str())
    }
}

/// Parses a chat markup link in a single left-to-right scan
///
/// `<url|text>` yields both parts, `<text>` only the text. Anything that does
/// not start with `<` or never closes with `>` is not a link.
pub fn parse_link(s: &str) -> Result<Link, LinkError> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'<') {
        return Err(LinkError);
    }

    // Everything between `<` and the most recent `|`
    let mut provisional: &str = "";
    for (i, byte) in bytes.iter().enumerate().skip(1) {
        match byte {
            b'|' => provisional = &s[1..i],
            b'>' => {
                let link = if provisional.is_empty() {
                    Link {
                        text: s[1..i].to_string(),
                        url: String::new(),
                    }
                } else {
                    Link {
                        text: s[provisional.len() + 2..i].to_string(),
                        url: provisional.to_string(),
                    }
                };
                return Ok(link);
            }
            _ => {}
        }
    }

    Err(LinkError)
}
