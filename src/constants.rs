pub(crate) const DEFAULT_WHOLE_STREAM_SIZE_LIMIT: u64 = std::u64::MAX;
pub(crate) const DEFAULT_PER_PART_SIZE_LIMIT: u64 = std::u64::MAX;

/// Queued bytes at which a part's relay stops accepting payload without
/// stalling the parser.
pub(crate) const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

/// Extra room in the lookbehind buffer past the boundary itself.
pub(crate) const LOOKBEHIND_MARGIN: usize = 8;

pub(crate) const BOUNDARY_EXT: &[u8] = b"--";
pub(crate) const CRLF: &[u8] = b"\r\n";

pub(crate) const CR: u8 = b'\r';
pub(crate) const LF: u8 = b'\n';
pub(crate) const SPACE: u8 = b' ';
pub(crate) const HYPHEN: u8 = b'-';
pub(crate) const COLON: u8 = b':';
