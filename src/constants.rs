pub(crate) const BOUNDARY_EXT: &str = "--";
pub(crate) const CR: u8 = b'\r';
pub(crate) const CRLF: &str = "\r\n";
pub(crate) const CRLF_CRLF: &str = "\r\n\r\n";
pub(crate) const TRANSPORT_PADDING: &str = " \t";

/// Body bytes are handed downstream in chunks of at most this size.
pub(crate) const BODY_CHUNK_SIZE: usize = 0xffff;

/// A part's header block may not exceed this size.
pub(crate) const MAX_HEADER_SIZE: usize = 0xffff;

pub(crate) fn is_transport_padding(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

pub(crate) fn is_line_end(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}
