/// Expands `%` patterns in output file and directory names.
///
/// | Pattern | Replaced by |
/// |---|---|
/// | `%f` | board file name without extension |
/// | `%i` | id of the generated file, e.g. `bom` |
/// | `%x` | file extension |
/// | `%v` | file id of the variant, empty without one |
/// | `%I` | `output_id` of the output |
/// | `%%` | a literal `%` |
///
/// Any other `%` sequence is kept as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNamer<'a> {
    pub board: &'a str,
    pub variant: &'a str,
    pub output_id: &'a str,
}

impl FileNamer<'_> {
    pub fn expand(&self, pattern: &str, id: &str, ext: &str) -> String {
        let mut out = String::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('f') => out.push_str(self.board),
                Some('i') => out.push_str(id),
                Some('x') => out.push_str(ext),
                Some('v') => out.push_str(self.variant),
                Some('I') => out.push_str(self.output_id),
                Some('%') => out.push('%'),
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
                None => out.push('%'),
            }
        }
        out
    }
}
