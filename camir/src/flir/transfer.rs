//! Block-wise image retrieval from the camera's flash storage.
//!
//! Stored images live in `\images`. Retrieving one takes two steps:
//!
//! 1. **Size discovery.** `cd \images` followed by `ls -l`; the size is read
//!    from a fixed column of the listing (see [`parse_listing_size`]).
//! 2. **Block fetch.** `getfblock "\images\<name>" <offset> <len>` for each
//!    1024-byte block, then one final request for the remainder. The final
//!    request is sent even when the remainder is zero.
//!
//! ## Block response framing
//!
//! ```text
//! <echoed command and prompt> 00 xx xx <payload: len bytes> [trailing prompt]
//! ```
//!
//! The payload starts [`BLOCK_HEADER_SKIP`] bytes after the first null byte,
//! counting the null itself. This is a quirk of the A40's echo behaviour,
//! not a general framing rule. Anything after the payload is ignored.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use super::channel::{frame_command, ThermalChannel};
use crate::error::{Error, Result};
use crate::transport::{LinkGuard, SerialLink};

/// Bytes requested per full block.
pub const BLOCK_SIZE: usize = 1024;

/// Directory holding stored images.
pub const IMAGE_DIR: &str = "\\images";

/// Pause between writing a block request and reading its response.
pub const BLOCK_DELAY: Duration = Duration::from_millis(100);

/// Offset of the payload from the first null byte of a block response.
pub const BLOCK_HEADER_SKIP: usize = 3;

/// Characters between the end of the size column and the file name in
/// `ls -l` output (date and time columns).
const SIZE_FIELD_GAP: usize = 19;

/// Width of the right-aligned size column.
const SIZE_FIELD_WIDTH: usize = 6;

/// Read an image's byte size out of `ls -l` output.
///
/// Finds the first occurrence of `name` and parses the
/// [`SIZE_FIELD_WIDTH`]-character field that ends [`SIZE_FIELD_GAP`]
/// characters before it. This relies on the exact column layout of the A40
/// listing.
///
/// # Errors
///
/// [`Error::SizeNotFound`] if the name is missing, the field would start
/// before the beginning of the text, or the field is not an integer.
pub fn parse_listing_size(listing: &str, name: &str) -> Result<usize> {
    let not_found = || Error::SizeNotFound(name.to_string());

    let name_start = listing.find(name).ok_or_else(not_found)?;
    let field_end = name_start.checked_sub(SIZE_FIELD_GAP).ok_or_else(not_found)?;
    let field_start = field_end
        .checked_sub(SIZE_FIELD_WIDTH)
        .ok_or_else(not_found)?;
    let field = listing.get(field_start..field_end).ok_or_else(not_found)?;

    field.trim().parse().map_err(|_| not_found())
}

/// Extract the `len`-byte payload of a block response.
///
/// `offset` only labels the error.
///
/// # Errors
///
/// [`Error::MalformedBlock`] if there is no null byte or fewer than `len`
/// bytes follow the header.
pub fn strip_block_header(raw: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let malformed = |received| Error::MalformedBlock {
        offset,
        expected: len,
        received,
    };

    let null_at = raw.iter().position(|&b| b == 0x00).ok_or(malformed(0))?;
    let start = null_at + BLOCK_HEADER_SKIP;
    let available = raw.len().saturating_sub(start);
    if available < len {
        return Err(malformed(available));
    }
    Ok(&raw[start..start + len])
}

/// `(offset, len)` of every request needed for an image of `size` bytes.
///
/// Always ends with the remainder request, which has length 0 when `size`
/// is a multiple of [`BLOCK_SIZE`].
pub fn block_requests(size: usize) -> Vec<(usize, usize)> {
    let remainder = size % BLOCK_SIZE;
    let mut requests: Vec<(usize, usize)> = (0..size - remainder)
        .step_by(BLOCK_SIZE)
        .map(|offset| (offset, BLOCK_SIZE))
        .collect();
    requests.push((size - remainder, remainder));
    requests
}

/// `getfblock` command line for one block.
pub fn block_command(name: &str, offset: usize, len: usize) -> String {
    format!("getfblock \"{IMAGE_DIR}\\{name}\" {offset} {len} ")
}

/// Persist a retrieved image verbatim.
pub fn write_to_file(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    std::fs::write(path.as_ref(), bytes)?;
    info!("Wrote {} bytes to {}", bytes.len(), path.as_ref().display());
    Ok(())
}

/// Progress of one image transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    size: usize,
    buffer: Vec<u8>,
    offset: usize,
}

impl TransferState {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            buffer: Vec::with_capacity(size),
            offset: 0,
        }
    }

    /// Target size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Offset of the next block to request
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes accumulated so far
    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_complete(&self) -> bool {
        self.buffer.len() == self.size
    }

    /// Percentage of the image received, 0–100.
    pub fn progress_percent(&self) -> f64 {
        if self.size == 0 {
            return 100.0;
        }
        100.0 * self.buffer.len() as f64 / self.size as f64
    }

    fn append(&mut self, payload: &[u8]) {
        debug_assert!(self.buffer.len() + payload.len() <= self.size);
        self.buffer.extend_from_slice(payload);
        self.offset += payload.len();
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Retrieves stored images over a [`ThermalChannel`].
///
/// Borrows the channel for the duration of the transfer, which keeps
/// other commands off the link while blocks are in flight.
pub struct ImageTransfer<'a, L: SerialLink> {
    channel: &'a mut ThermalChannel<L>,
    block_delay: Duration,
}

impl<'a, L: SerialLink> ImageTransfer<'a, L> {
    pub fn new(channel: &'a mut ThermalChannel<L>) -> Self {
        Self {
            channel,
            block_delay: BLOCK_DELAY,
        }
    }

    /// Override the pause between block request and read.
    pub fn with_block_delay(mut self, block_delay: Duration) -> Self {
        self.block_delay = block_delay;
        self
    }

    /// Look up the byte size of a stored image.
    pub fn discover_size(&mut self, name: &str) -> Result<usize> {
        let cd = format!("cd {IMAGE_DIR}");
        let raw = self.channel.exchange(&[cd.as_str(), "ls -l"])?;
        let listing = String::from_utf8(raw).map_err(|e| Error::Decode(e.into_bytes()))?;
        let size = parse_listing_size(&listing, name)?;
        debug!("{} is {} bytes", name, size);
        Ok(size)
    }

    /// Retrieve `size` bytes of `name`.
    pub fn fetch(&mut self, name: &str, size: usize) -> Result<Vec<u8>> {
        self.fetch_with_progress(name, size, |_| {})
    }

    /// Retrieve `size` bytes of `name`, calling `progress` after each block.
    ///
    /// The link stays open for the whole transfer. Any failed block aborts
    /// the transfer and discards what was received.
    pub fn fetch_with_progress<F>(&mut self, name: &str, size: usize, mut progress: F) -> Result<Vec<u8>>
    where
        F: FnMut(&TransferState),
    {
        let block_delay = self.block_delay;
        let mut state = TransferState::new(size);
        let mut open = LinkGuard::acquire(self.channel.link_mut())?;

        for (offset, len) in block_requests(size) {
            let command = block_command(name, offset, len);
            debug!("FLIR send: {:?}", command);
            open.write_all(frame_command(&command).as_bytes())?;
            thread::sleep(block_delay);

            let raw = open.read_available()?;
            let payload = strip_block_header(&raw, offset, len)?;
            state.append(payload);
            progress(&state);
        }
        drop(open);

        debug_assert!(state.is_complete());
        info!("Retrieved {} ({} bytes)", name, state.received());
        Ok(state.into_bytes())
    }

    /// Discover, fetch and write `name` to `output`. Returns the byte count.
    ///
    /// Nothing is written unless every block arrived.
    pub fn get_image(&mut self, name: &str, output: impl AsRef<Path>) -> Result<usize> {
        let size = self.discover_size(name)?;
        let bytes = self.fetch(name, size)?;
        write_to_file(output, &bytes)?;
        Ok(bytes.len())
    }
}


#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;
    use crate::transport::mock::MockLink;
    use std::sync::{Arc, Mutex};

    fn channel_serving(image: Vec<u8>) -> ThermalChannel<MockLink> {
        ThermalChannel::new(MockLink::with_responder(move |w| block_response(&image, w)))
    }

    fn requested(link: &MockLink) -> Vec<(usize, usize)> {
        link.written_lines()
            .iter()
            .map(|line| {
                let fields: Vec<&str> = line.split_whitespace().collect();
                (fields[2].parse().unwrap(), fields[3].parse().unwrap())
            })
            .collect()
    }

    #[test]
    fn test_block_requests_with_remainder() {
        assert_eq!(
            block_requests(2500),
            vec![(0, 1024), (1024, 1024), (2048, 452)]
        );
    }

    #[test]
    fn test_block_requests_exact_multiple_ends_with_empty_block() {
        assert_eq!(block_requests(2048), vec![(0, 1024), (1024, 1024), (2048, 0)]);
        assert_eq!(block_requests(0), vec![(0, 0)]);
        assert_eq!(block_requests(10), vec![(0, 10)]);
    }

    #[test]
    fn test_block_command_format() {
        assert_eq!(
            block_command("IR_0001.jpg", 1024, 452),
            "getfblock \"\\images\\IR_0001.jpg\" 1024 452 "
        );
    }

    #[test]
    fn test_parse_listing_size() {
        let listing = format!(
            "\\> ls -l\r\n{}{}\\>",
            listing_line(83211, "IR_0001.jpg"),
            listing_line(2500, "IR_0002.jpg")
        );
        assert_eq!(parse_listing_size(&listing, "IR_0001.jpg").unwrap(), 83211);
        assert_eq!(parse_listing_size(&listing, "IR_0002.jpg").unwrap(), 2500);
    }

    #[test]
    fn test_parse_listing_size_full_width_field() {
        let listing = listing_line(123456, "big.jpg");
        assert_eq!(parse_listing_size(&listing, "big.jpg").unwrap(), 123456);
    }

    #[test]
    fn test_parse_listing_size_missing_name() {
        let listing = listing_line(2500, "IR_0002.jpg");
        assert!(matches!(
            parse_listing_size(&listing, "IR_0009.jpg"),
            Err(Error::SizeNotFound(ref n)) if n == "IR_0009.jpg"
        ));
    }

    #[test]
    fn test_parse_listing_size_misaligned() {
        // name too close to the start for the size column to exist
        assert!(matches!(
            parse_listing_size("IR_0002.jpg", "IR_0002.jpg"),
            Err(Error::SizeNotFound(_))
        ));
        // column present but not numeric
        let listing = "-rw-r--r-- 1 abcdef 17-06-01 12:34:56 x.jpg";
        assert!(matches!(
            parse_listing_size(listing, "x.jpg"),
            Err(Error::SizeNotFound(_))
        ));
    }

    #[test]
    fn test_strip_block_header() {
        let raw = [b'g', b'e', b't', 0x00, 0xAA, 0xBB, 1, 2, 3, 4, b'>'];
        assert_eq!(strip_block_header(&raw, 0, 4).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(strip_block_header(&raw, 0, 0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_strip_block_header_payload_may_contain_nulls() {
        let raw = [b'>', 0x00, 0x00, 0x00, 0x00, 0x05, 0x00];
        assert_eq!(strip_block_header(&raw, 0, 4).unwrap(), &[0x00, 0x00, 0x05, 0x00]);
    }

    #[test]
    fn test_strip_block_header_short_or_unframed() {
        let short = [b'x', 0x00, 0xAA, 0xBB, 1, 2];
        assert!(matches!(
            strip_block_header(&short, 2048, 4),
            Err(Error::MalformedBlock {
                offset: 2048,
                expected: 4,
                received: 2
            })
        ));

        assert!(matches!(
            strip_block_header(b"no terminator here", 0, 1),
            Err(Error::MalformedBlock { received: 0, .. })
        ));
        assert!(strip_block_header(&[], 0, 0).is_err());
    }

    #[test]
    fn test_fetch_2500_bytes() {
        let image = image(2500);
        let mut channel = channel_serving(image.clone());

        let bytes = ImageTransfer::new(&mut channel)
            .with_block_delay(Duration::ZERO)
            .fetch("IR_0002.jpg", 2500)
            .unwrap();

        assert_eq!(bytes.len(), 2500);
        assert_eq!(bytes, image);

        let link = channel.link();
        assert_eq!(requested(link), vec![(0, 1024), (1024, 1024), (2048, 452)]);
        assert!(link.written_lines()[0].starts_with("\rgetfblock \"\\images\\IR_0002.jpg\" 0 1024"));
        assert_eq!(link.open_count(), 1);
        assert!(!link.is_open());
    }

    #[test]
    fn test_fetch_exact_multiple_requests_terminal_block() {
        let image = image(2048);
        let mut channel = channel_serving(image.clone());

        let bytes = ImageTransfer::new(&mut channel)
            .with_block_delay(Duration::ZERO)
            .fetch("a.jpg", 2048)
            .unwrap();

        assert_eq!(bytes, image);
        assert_eq!(
            requested(channel.link()),
            vec![(0, 1024), (1024, 1024), (2048, 0)]
        );
    }

    #[test]
    fn test_fetch_reports_progress() {
        let mut channel = channel_serving(image(2500));
        let mut seen = Vec::new();

        ImageTransfer::new(&mut channel)
            .with_block_delay(Duration::ZERO)
            .fetch_with_progress("p.jpg", 2500, |state| {
                seen.push((state.offset(), state.received(), state.is_complete()))
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![(1024, 1024, false), (2048, 2048, false), (2500, 2500, true)]
        );
    }

    #[test]
    fn test_fetch_aborts_on_short_block_and_releases_link() {
        let image = image(2500);
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        let link = MockLink::with_responder(move |w| {
            let mut n = counter.lock().unwrap();
            *n += 1;
            let mut response = block_response(&image, w);
            if *n == 2 {
                // lose the tail of the second block
                response.truncate(response.len() - 600);
            }
            response
        });
        let mut channel = ThermalChannel::new(link);

        let result = ImageTransfer::new(&mut channel)
            .with_block_delay(Duration::ZERO)
            .fetch("x.jpg", 2500);

        assert!(matches!(
            result,
            Err(Error::MalformedBlock { offset: 1024, expected: 1024, .. })
        ));
        // no further blocks requested after the failure
        assert_eq!(*calls.lock().unwrap(), 2);
        assert!(!channel.link().is_open());
        assert_eq!(channel.link().close_count(), 1);
    }

    #[test]
    fn test_discover_size_sends_cd_and_ls() {
        let listing = format!("{}{}", listing_line(512, "a.jpg"), listing_line(2500, "b.jpg"));
        let mut channel = ThermalChannel::new(MockLink::scripted([
            b"cd \\images\r\n".to_vec(),
            listing.into_bytes(),
        ]));

        let size = ImageTransfer::new(&mut channel).discover_size("b.jpg").unwrap();
        assert_eq!(size, 2500);
        assert_eq!(
            channel.link().written_lines(),
            vec!["\rcd \\images\r".to_string(), "\rls -l\r".to_string()]
        );
        assert_eq!(channel.link().open_count(), 1);
    }

    #[test]
    fn test_discover_size_missing() {
        let mut channel = ThermalChannel::new(MockLink::scripted([
            Vec::new(),
            listing_line(512, "a.jpg").into_bytes(),
        ]));
        assert!(matches!(
            ImageTransfer::new(&mut channel).discover_size("zzz.jpg"),
            Err(Error::SizeNotFound(_))
        ));
    }

    #[test]
    fn test_transfer_state_progress() {
        let mut state = TransferState::new(2000);
        assert_eq!(state.progress_percent(), 0.0);
        state.append(&[0u8; 1000]);
        assert_eq!(state.progress_percent(), 50.0);
        assert!(!state.is_complete());
        state.append(&[0u8; 1000]);
        assert!(state.is_complete());
        assert_eq!(TransferState::new(0).progress_percent(), 100.0);
    }

    #[test]
    fn test_write_to_file_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let bytes = image(3000);
        write_to_file(&path, &bytes).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }
}
