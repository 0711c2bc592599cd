use std::fmt::Write;

pub const BYTES_PER_LINE: usize = 16;

/// Classic offset / hex / ASCII dump, one line per 16 bytes.
///
/// `0x0010: 45 00 00 3c ...   E..<....`
///
/// Short final lines are padded so the ASCII column stays aligned; padded
/// positions show as `.` in the ASCII column.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (index, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        write_line(&mut out, index * BYTES_PER_LINE, chunk);
    }
    out
}

fn write_line(out: &mut String, offset: usize, chunk: &[u8]) {
    let _ = write!(out, "0x{offset:04x}:");
    for i in 0..BYTES_PER_LINE {
        match chunk.get(i) {
            Some(byte) => {
                let _ = write!(out, " {byte:02x}");
            }
            None => out.push_str("   "),
        }
    }
    out.push(' ');
    for i in 0..BYTES_PER_LINE {
        out.push(chunk.get(i).copied().map_or('.', printable));
    }
    out.push('\n');
}

fn printable(byte: u8) -> char {
    if (32..=126).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}
