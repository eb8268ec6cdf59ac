use std::fmt::Write;

/// One feature's contribution to the generated output. Fragments are
/// concatenated in feature order; `size` is the number of bytes the
/// fragment's tables occupy in the compiled runtime, used for reporting.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub source: String,
    pub header: String,
    pub public_header: String,
    pub size: usize,
}

impl Fragment {
    /// A fragment that only defines a feature-presence marker in the
    /// public header.
    pub fn marker(name: &str) -> Fragment {
        Fragment {
            public_header: format!("#define {}\n", name),
            ..Default::default()
        }
    }

    pub fn append(&mut self, other: Fragment) {
        self.source.push_str(&other.source);
        self.header.push_str(&other.header);
        self.public_header.push_str(&other.public_header);
        self.size += other.size;
    }
}

/// Drops every blank line. The per-feature fragments are stitched
/// together with separating newlines which would otherwise leave gaps in
/// the emitted files.
pub fn strip_blank_lines(s: &str) -> String {
    let mut out = s
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// Writes a `static const uint16_t` array, eight values per line, matching
/// the layout the runtime's tables have always used.
pub fn write_u16_array(out: &mut String, indent: &str, name: &str, values: &[u16]) {
    let _ = write!(out, "{}static const uint16_t {}[] = {{", indent, name);
    for (index, value) in values.iter().enumerate() {
        if index % 8 == 0 {
            let _ = write!(out, "\n{}    ", indent);
        }
        let _ = write!(out, "{}u, ", value);
    }
    let _ = writeln!(out, "\n{}}};", indent);
}

/// Writes a `const unichar` array of codepoints, four values per line,
/// each wrapped in the runtime's `UNICHAR_C` literal macro.
pub fn write_unichar_array(out: &mut String, name: &str, values: &[u32]) {
    let _ = write!(out, "const unichar {}[] = {{", name);
    for (index, value) in values.iter().enumerate() {
        if index % 4 == 0 {
            out.push_str("\n    ");
        }
        let _ = write!(out, "UNICHAR_C(0x{:04X}), ", value);
    }
    out.push_str("};\n\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_blank_lines() {
        assert_eq!(strip_blank_lines("a\n\nb\n   \nc\n"), "a\nb\nc\n");
        assert_eq!(strip_blank_lines(""), "\n");
        assert_eq!(strip_blank_lines("x"), "x\n");
    }

    #[test]
    fn test_marker_fragment() {
        let frag = Fragment::marker("UNI_FEATURE_CCC");
        assert_eq!(frag.public_header, "#define UNI_FEATURE_CCC\n");
        assert!(frag.source.is_empty());
        assert_eq!(frag.size, 0);
    }

    #[test]
    fn test_u16_array_layout() {
        let mut out = String::new();
        write_u16_array(&mut out, "    ", "t", &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        // eight values on the first line, the ninth wraps
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "    static const uint16_t t[] = {");
        assert_eq!(lines[1].matches("u, ").count(), 8);
        assert_eq!(lines[2].trim(), "9u,");
    }

    #[test]
    fn test_append_accumulates() {
        let mut a = Fragment {
            source: "s1".into(),
            size: 2,
            ..Default::default()
        };
        a.append(Fragment {
            source: "s2".into(),
            header: "h".into(),
            size: 3,
            ..Default::default()
        });
        assert_eq!(a.source, "s1s2");
        assert_eq!(a.header, "h");
        assert_eq!(a.size, 5);
    }
}
