//! Image chunk queues and the delivery policy.
//!
//! Image data arrives as chunks, each wrapped with the status of the reply
//! that carried it. Chunks queue per sheet side until the delivery policy
//! decides enough has accumulated to hand the front chunk upward:
//!
//! - [`DeliveryPolicy::FrontNonEmpty`] hands chunks up as they arrive.
//! - [`DeliveryPolicy::WaitForPageEnd`] holds a page until its page-end
//!   chunk is queued, then patches the page-start chunk's advertised size
//!   from the page-end actuals. Needed when the advertised size cannot be
//!   trusted up front: the device truncates at the media end, or the
//!   source detects the page end mid-scan.
//!
//! When the transfer format is JPEG the size patch extends into the data
//! itself: the height/width fields of the DCT frame header are rewritten
//! so downstream decoders see the corrected dimensions.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use scanforge_core::Side;
use scanforge_protocol::{ImageSize, Status};
use tracing::{debug, warn};

/// One streamed image chunk and the status that carried it.
#[derive(Debug, Clone)]
pub struct DataBuffer {
    pub data: Bytes,
    pub status: Status,
}

impl DataBuffer {
    #[must_use]
    pub fn new(data: Bytes, status: Status) -> Self {
        DataBuffer { data, status }
    }

    /// Side this chunk belongs to; single-sided scans report the face.
    #[must_use]
    pub fn side(&self) -> Side {
        self.status.side.unwrap_or(Side::Face)
    }

    #[must_use]
    pub fn is_page_start(&self) -> bool {
        self.status.page_start.is_some()
    }

    #[must_use]
    pub fn is_page_end(&self) -> bool {
        self.status.page_end.is_some()
    }
}

/// When a queued chunk may be delivered upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Deliver as soon as the front of a queue is non-empty.
    FrontNonEmpty,
    /// Hold each page until its page-end chunk arrives, then patch the
    /// page-start size from the page-end actuals before delivering.
    WaitForPageEnd,
}

/// Ordered per-side chunk queues governed by one delivery policy.
#[derive(Debug)]
pub struct SideQueues {
    face: PageQueue,
    rear: PageQueue,
    policy: DeliveryPolicy,
    jpeg: bool,
}

#[derive(Debug, Default)]
struct PageQueue {
    chunks: VecDeque<DataBuffer>,
    /// Pages whose page-end chunk has been queued but not yet popped.
    complete_pages: u32,
}

impl SideQueues {
    /// Create queues for one acquisition.
    ///
    /// `jpeg` enables the DCT frame header patch on page-start chunks.
    #[must_use]
    pub fn new(policy: DeliveryPolicy, jpeg: bool) -> Self {
        SideQueues {
            face: PageQueue::default(),
            rear: PageQueue::default(),
            policy,
            jpeg,
        }
    }

    #[must_use]
    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    /// Queue a chunk on its side.
    ///
    /// Under the wait-for-page-end policy, a page-end chunk completes the
    /// oldest open page on that side: the page-start chunk's advertised
    /// width/height are patched from the page-end actuals, including the
    /// JPEG frame header bytes when the transfer format is JPEG.
    pub fn push(&mut self, buffer: DataBuffer) {
        let jpeg = self.jpeg;
        let patch = self.policy == DeliveryPolicy::WaitForPageEnd;
        let queue = self.queue_mut(buffer.side());

        if patch && let Some(actual) = buffer.status.page_end {
            queue.patch_open_page(actual, jpeg);
            queue.complete_pages += 1;
        }
        queue.chunks.push_back(buffer);
    }

    /// Pop the next deliverable chunk, face side first.
    #[must_use]
    pub fn pop(&mut self) -> Option<DataBuffer> {
        let policy = self.policy;
        self.face.pop(policy).or_else(|| self.rear.pop(policy))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.face.chunks.is_empty() && self.rear.chunks.is_empty()
    }

    /// Drop everything still queued, e.g. after a cancellation.
    pub fn clear(&mut self) {
        self.face = PageQueue::default();
        self.rear = PageQueue::default();
    }

    fn queue_mut(&mut self, side: Side) -> &mut PageQueue {
        match side {
            Side::Face => &mut self.face,
            Side::Rear => &mut self.rear,
        }
    }
}

impl PageQueue {
    fn pop(&mut self, policy: DeliveryPolicy) -> Option<DataBuffer> {
        match policy {
            DeliveryPolicy::FrontNonEmpty => self.chunks.pop_front(),
            DeliveryPolicy::WaitForPageEnd => {
                if self.complete_pages == 0 {
                    return None;
                }
                let buffer = self.chunks.pop_front()?;
                if buffer.is_page_end() {
                    self.complete_pages -= 1;
                }
                Some(buffer)
            }
        }
    }

    /// Patch the oldest queued page-start chunk from page-end actuals.
    fn patch_open_page(&mut self, actual: ImageSize, jpeg: bool) {
        let open = self
            .chunks
            .iter_mut()
            .rev()
            .find_map(|chunk| chunk.status.page_start.map(|size| (chunk, size)));
        let Some((start, advertised)) = open else {
            warn!("page end arrived with no page start queued");
            return;
        };
        if advertised.width == actual.width && advertised.height == actual.height {
            return;
        }
        debug!(
            advertised_width = advertised.width,
            advertised_height = advertised.height,
            actual_width = actual.width,
            actual_height = actual.height,
            "patching advertised page size from page end"
        );
        start.status.page_start = Some(ImageSize {
            width: actual.width,
            padding: advertised.padding,
            height: actual.height,
        });

        if jpeg {
            if let Some(patched) =
                patch_jpeg_dimensions(&start.data, actual.width as u16, actual.height as u16)
            {
                start.data = patched;
            } else {
                warn!("no DCT frame header found in page-start chunk");
            }
        }
    }
}

/// Rewrite the height/width fields of the first DCT frame header.
///
/// Scans for an SOF marker (`FFC0`–`FFCF`, excluding the non-frame markers
/// `C4`, `C8` and `CC`) and replaces the 16-bit height and width that
/// follow the sample precision byte. Returns `None` when no frame header
/// is present in `data`.
#[must_use]
pub fn patch_jpeg_dimensions(data: &[u8], width: u16, height: u16) -> Option<Bytes> {
    let sof = find_sof_offset(data)?;
    // segment layout: FF Cn len_hi len_lo precision h_hi h_lo w_hi w_lo
    if data.len() < sof + 9 {
        return None;
    }
    let mut patched = BytesMut::from(data);
    patched[sof + 5..sof + 7].copy_from_slice(&height.to_be_bytes());
    patched[sof + 7..sof + 9].copy_from_slice(&width.to_be_bytes());
    Some(patched.freeze())
}

fn find_sof_offset(data: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = data[i + 1];
        match marker {
            // fill bytes and markers without payloads
            0xFF | 0xD8 | 0x01 | 0xD0..=0xD7 => {
                i += if marker == 0xFF { 1 } else { 2 };
            }
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                return Some(i);
            }
            _ => {
                // skip the segment by its declared length
                if i + 3 >= data.len() {
                    return None;
                }
                let len = usize::from(u16::from_be_bytes([data[i + 2], data[i + 3]]));
                i += 2 + len;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn start_chunk(side: Option<Side>, width: u32, height: u32, data: &[u8]) -> DataBuffer {
        let mut status = Status::default();
        status.page_start = Some(ImageSize {
            width,
            padding: 0,
            height,
        });
        status.side = side;
        DataBuffer::new(Bytes::copy_from_slice(data), status)
    }

    fn end_chunk(side: Option<Side>, width: u32, height: u32) -> DataBuffer {
        let mut status = Status::default();
        status.page_end = Some(ImageSize {
            width,
            padding: 0,
            height,
        });
        status.side = side;
        DataBuffer::new(Bytes::new(), status)
    }

    fn plain_chunk(side: Option<Side>, data: &[u8]) -> DataBuffer {
        let mut status = Status::default();
        status.side = side;
        DataBuffer::new(Bytes::copy_from_slice(data), status)
    }

    #[test]
    fn test_front_non_empty_delivers_immediately() {
        let mut queues = SideQueues::new(DeliveryPolicy::FrontNonEmpty, false);
        queues.push(start_chunk(None, 100, 200, b"abc"));

        let delivered = queues.pop().unwrap();
        assert_eq!(&delivered.data[..], b"abc");
        assert!(queues.is_empty());
    }

    #[test]
    fn test_wait_for_page_end_holds_until_complete() {
        let mut queues = SideQueues::new(DeliveryPolicy::WaitForPageEnd, false);
        queues.push(start_chunk(None, 100, 200, b"abc"));
        queues.push(plain_chunk(None, b"def"));
        assert!(queues.pop().is_none());

        queues.push(end_chunk(None, 100, 180));
        let first = queues.pop().unwrap();
        assert!(first.is_page_start());
        assert!(queues.pop().is_some());
        assert!(queues.pop().unwrap().is_page_end());
        assert!(queues.pop().is_none());
    }

    #[test]
    fn test_page_end_patches_advertised_size() {
        let mut queues = SideQueues::new(DeliveryPolicy::WaitForPageEnd, false);
        queues.push(start_chunk(None, 100, 200, b"abc"));
        queues.push(end_chunk(None, 100, 150));

        let start = queues.pop().unwrap();
        let size = start.status.page_start.unwrap();
        assert_eq!(size.height, 150);
        assert_eq!(size.width, 100);
    }

    #[test]
    fn test_sides_queue_independently() {
        let mut queues = SideQueues::new(DeliveryPolicy::WaitForPageEnd, false);
        queues.push(start_chunk(Some(Side::Rear), 10, 10, b"rear"));
        queues.push(start_chunk(Some(Side::Face), 10, 10, b"face"));
        queues.push(end_chunk(Some(Side::Face), 10, 10));

        // only the face page is complete; face side delivers first
        let delivered = queues.pop().unwrap();
        assert_eq!(delivered.side(), Side::Face);
        assert!(queues.pop().unwrap().is_page_end());
        assert!(queues.pop().is_none());
    }

    fn tiny_jpeg(width: u16, height: u16) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8]; // SOI
        // APP0 segment with 4 payload bytes
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x06, b'J', b'F', b'I', b'F']);
        // DHT segment (must not be mistaken for a frame header)
        data.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x04, 0x00, 0x01]);
        // SOF0
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&[0x01, 0x11, 0x00]);
        data
    }

    #[test]
    fn test_jpeg_patch_rewrites_frame_header() {
        let original = tiny_jpeg(100, 200);
        let patched = patch_jpeg_dimensions(&original, 100, 150).unwrap();

        let sof = original
            .windows(2)
            .position(|w| w == [0xFF, 0xC0])
            .unwrap();
        assert_eq!(&patched[sof + 5..sof + 7], &150u16.to_be_bytes());
        assert_eq!(&patched[sof + 7..sof + 9], &100u16.to_be_bytes());
        // everything else untouched
        assert_eq!(&patched[..sof + 5], &original[..sof + 5]);
    }

    #[test]
    fn test_jpeg_patch_without_frame_header() {
        assert!(patch_jpeg_dimensions(b"not a jpeg", 10, 10).is_none());
    }

    #[test]
    fn test_jpeg_patch_applied_on_page_end() {
        let original = tiny_jpeg(100, 200);
        let mut queues = SideQueues::new(DeliveryPolicy::WaitForPageEnd, true);
        queues.push(start_chunk(None, 100, 200, &original));
        queues.push(end_chunk(None, 100, 150));

        let start = queues.pop().unwrap();
        let sof = start
            .data
            .windows(2)
            .position(|w| w == [0xFF, 0xC0])
            .unwrap();
        assert_eq!(&start.data[sof + 5..sof + 7], &150u16.to_be_bytes());
    }
}
