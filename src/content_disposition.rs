pub(crate) struct ContentDisposition {
    pub(crate) part_name: Option<String>,
    pub(crate) file_name: Option<String>,
}

impl ContentDisposition {
    pub(crate) fn parse(value: &str) -> ContentDisposition {
        let part_name = find_param(value, "name=\"").and_then(|start| {
            let rest = &value[start..];
            rest.find('"').filter(|&end| end > 0).map(|end| rest[..end].to_owned())
        });

        let file_name = find_param(value, "filename=\"")
            .and_then(|start| quoted_file_name(&value[start..]))
            .map(decode_file_name);

        ContentDisposition { part_name, file_name }
    }
}

/// Finds `key` (ASCII, case-insensitive) where it isn't the tail of a longer
/// parameter name, returning the offset just past it.
fn find_param(value: &str, key: &str) -> Option<usize> {
    let haystack = value.as_bytes();
    let needle = key.as_bytes();

    (0..haystack.len().checked_sub(needle.len())? + 1)
        .filter(|&idx| haystack[idx..idx + needle.len()].eq_ignore_ascii_case(needle))
        .find(|&idx| idx == 0 || !is_param_char(haystack[idx - 1]))
        .map(|idx| idx + needle.len())
}

fn is_param_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'*'
}

/// Browsers don't escape quotes inside `filename`, so the value runs up to the
/// first quote that closes the parameter: one followed by the end of the
/// header, a space or a `;`.
fn quoted_file_name(rest: &str) -> Option<&str> {
    let bytes = rest.as_bytes();

    memchr::memchr_iter(b'"', bytes)
        .find(|&idx| matches!(bytes.get(idx + 1), None | Some(b' ') | Some(b';')))
        .map(|idx| &rest[..idx])
}

/// Legacy clean-up of user agent supplied file names: drops any client side
/// directory, unescapes `%22` and decodes four digit `&#DDDD` references.
fn decode_file_name(raw: &str) -> String {
    let base = match raw.rfind(|ch: char| ch == '\\' || ch == '/') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    };

    decode_numeric_refs(&base.replace("%22", "\""))
}

fn decode_numeric_refs(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(idx) = rest.find("&#") {
        out.push_str(&rest[..idx]);
        let candidate = &rest[idx + 2..];

        let digits = candidate.as_bytes().iter().take(4).take_while(|b| b.is_ascii_digit()).count();
        let decoded = if digits == 4 {
            candidate[..4].parse::<u32>().ok().and_then(std::char::from_u32)
        } else {
            None
        };

        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &candidate[4..];
                if rest.starts_with(';') {
                    rest = &rest[1..];
                }
            }
            None => {
                out.push_str("&#");
                rest = candidate;
            }
        }
    }

    out.push_str(rest);
    out
}
