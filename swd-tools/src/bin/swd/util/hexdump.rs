//! Hex and ASCII rendering of memory buffers.

/// Bytes shown per line.
const LINE_LEN: usize = 16;

/// The access width of memory values, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    B8,
    B16,
    B32,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Self::B8 => 1,
            Self::B16 => 2,
            Self::B32 => 4,
        }
    }

    pub fn bits(self) -> u32 {
        8 * self.bytes() as u32
    }

    /// Characters of the hex column of a complete line.
    fn hex_column_len(self) -> usize {
        let groups = LINE_LEN / self.bytes();
        groups * (2 * self.bytes() + 1) - 1
    }
}

/// Lines of a hex dump, rendered lazily.
///
/// Each line shows up to 16 bytes as `AAAAAAAA  <hex>  <ascii>`. A run of
/// lines identical to the one before is collapsed into a single `*` unless
/// `verbose` is at least 1. With `verbose` of 2 or more the address after
/// the last byte is printed at the end.
#[derive(Debug, Clone)]
pub struct HexDump<'a> {
    address: u32,
    lines: std::slice::Chunks<'a, u8>,
    width: Width,
    verbose: u8,
    previous: Option<&'a [u8]>,
    collapsed: bool,
    done: bool,
}

impl<'a> HexDump<'a> {
    pub fn new(address: u32, data: &'a [u8], width: Width, verbose: u8) -> Self {
        Self {
            address,
            lines: data.chunks(LINE_LEN),
            width,
            verbose,
            previous: None,
            collapsed: false,
            done: false,
        }
    }

    fn hex_column(&self, line: &[u8]) -> String {
        let digits = 2 * self.width.bytes();
        let groups: Vec<String> = line
            .chunks(self.width.bytes())
            .map(|group| {
                let value = group
                    .iter()
                    .rev()
                    .fold(0u32, |value, byte| value << 8 | u32::from(*byte));
                format!("{value:0digits$x}")
            })
            .collect();

        format!("{:<len$}", groups.join(" "), len = self.width.hex_column_len())
    }
}

fn ascii_column(line: &[u8]) -> String {
    line.iter()
        .map(|byte| match byte {
            0x20..=0x7e => char::from(*byte),
            _ => '.',
        })
        .collect()
}

impl Iterator for HexDump<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for line in self.lines.by_ref() {
            let address = self.address;
            self.address = self.address.wrapping_add(line.len() as u32);

            if self.verbose > 0 || self.previous != Some(line) {
                self.previous = Some(line);
                self.collapsed = false;

                let hex = self.hex_column(line);
                return Some(format!("{address:08x}  {hex}  {}", ascii_column(line)));
            }

            if !self.collapsed {
                self.collapsed = true;
                return Some("*".to_string());
            }
        }

        if self.done {
            return None;
        }
        self.done = true;

        (self.verbose > 1).then(|| format!("{:08x}", self.address))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dump(address: u32, data: &[u8], width: Width, verbose: u8) -> Vec<String> {
        HexDump::new(address, data, width, verbose).collect()
    }

    #[test]
    fn column_widths() {
        assert_eq!(Width::B8.hex_column_len(), 47);
        assert_eq!(Width::B16.hex_column_len(), 39);
        assert_eq!(Width::B32.hex_column_len(), 35);
    }

    #[test]
    fn single_line_bytes() {
        assert_eq!(
            dump(0x2000_0000, b"Hello, world!\x00\x01\x7f", Width::B8, 0),
            vec!["20000000  48 65 6c 6c 6f 2c 20 77 6f 72 6c 64 21 00 01 7f  Hello, world!..."]
        );
    }

    #[test]
    fn repeated_lines_collapse() {
        let lines = dump(0, &[0; 32], Width::B8, 0);

        assert_eq!(
            lines,
            vec![
                format!("00000000  {}  {}", ["00"; 16].join(" "), ".".repeat(16)),
                "*".to_string(),
            ]
        );
    }

    #[test]
    fn long_run_collapses_once() {
        let mut data = vec![0xaa; 64];
        data.extend_from_slice(&[0x41; 16]);

        let lines = dump(0x100, &data, Width::B8, 0);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "*");
        assert!(lines[2].starts_with("00000140  41 41"));
        assert!(lines[2].ends_with("AAAAAAAAAAAAAAAA"));
    }

    #[test]
    fn verbose_prints_every_line() {
        let lines = dump(0, &[0; 32], Width::B8, 1);

        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("00000010  00 00"));
    }

    #[test]
    fn very_verbose_prints_end_address() {
        let lines = dump(0x2000_0000, &[0; 32], Width::B32, 2);

        assert_eq!(
            lines,
            vec![
                format!("20000000  {}  {}", ["00000000"; 4].join(" "), ".".repeat(16)),
                format!("20000010  {}  {}", ["00000000"; 4].join(" "), ".".repeat(16)),
                "20000020".to_string(),
            ]
        );
    }

    #[test]
    fn words_are_little_endian() {
        let lines = dump(0x2000_0000, &[0xef, 0xbe, 0xad, 0xde, 1, 0, 0, 0], Width::B32, 0);

        assert_eq!(
            lines,
            vec![format!(
                "20000000  {:<35}  ........",
                "deadbeef 00000001"
            )]
        );
    }

    #[test]
    fn partial_group_uses_present_bytes() {
        let lines = dump(0x10, &[0x34, 0x12, 0x56], Width::B16, 0);

        assert_eq!(lines, vec![format!("00000010  {:<39}  4.V", "1234 0056")]);
    }

    #[test]
    fn short_last_line() {
        let data: Vec<u8> = (0x30..0x44).collect();
        let lines = dump(0, &data, Width::B8, 0);

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            format!("00000010  {:<47}  @ABC", "40 41 42 43")
        );
    }

    #[test]
    fn dump_can_be_restarted() {
        let dump = HexDump::new(0, &[0; 48], Width::B8, 0);
        let first: Vec<String> = dump.clone().collect();

        assert_eq!(first, dump.collect::<Vec<_>>());
    }

    #[test]
    fn empty_buffer() {
        assert!(dump(0, &[], Width::B8, 0).is_empty());
        assert_eq!(dump(0x40, &[], Width::B8, 2), vec!["00000040"]);
    }
}
