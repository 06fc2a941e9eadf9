//! Hashed read-only filesystem section.
//!
//! ```text
//! rofs_t        { tag: u16, bucket_count: u16 }
//! rofs_bucket_t { entry_count: u32, entries: ptr }      x 64
//! rofs_entry_t  { name: ptr, data: ptr, size: u32 }     x entries
//! blob          name\0 [pad to 8] data\0 ...
//! ```
//!
//! Buckets appear in the entry table in the order they are first hit by
//! the manifest; entries inside a bucket keep manifest order. Loaders rely
//! only on the bucket table, but the byte layout is a build artifact and
//! must be reproducible.

use tracing::debug;

use super::align::align8;
use super::buffer::ImageBuf;
use super::entry::Entry;
use super::error::{to_u32, Result};
use super::format::{Addressing, Format};
use super::hash::bucket_of;

/// Number of hash buckets in the table.
pub const BUCKET_COUNT: usize = 64;

const TABLE_HEADER_LEN: usize = 2 + 2;
const BUCKET_LEN: usize = 4 + 4;
const RECORD_LEN: usize = 4 + 4 + 4;

/// One occupied bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPlan {
    pub index: usize,
    pub count: usize,
    /// Offset of the first entry record of this bucket.
    pub first_record: usize,
}

/// Placement of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Index into the manifest.
    pub entry: usize,
    pub record_at: usize,
    pub name_at: usize,
    pub data_at: usize,
    pub size: usize,
}

/// Dry-run layout of the ROFS section. All offsets are from the image start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RofsPlan {
    pub start: usize,
    pub buckets_at: usize,
    pub records_at: usize,
    pub blob_at: usize,
    pub end: usize,
    pub buckets: Vec<BucketPlan>,
    pub slots: Vec<Slot>,
}

impl RofsPlan {
    /// Lay out `(name, size)` items for a section beginning at `start`.
    pub fn compute(items: &[(&str, usize)], start: usize) -> Self {
        let buckets_at = start + TABLE_HEADER_LEN;
        let records_at = buckets_at + BUCKET_LEN * BUCKET_COUNT;
        let blob_at = records_at + RECORD_LEN * items.len();

        let mut record = records_at;
        let mut cursor = blob_at;
        let mut buckets = Vec::new();
        let mut slots = Vec::with_capacity(items.len());

        for (index, members) in group_by_bucket(items.iter().map(|(name, _)| *name)) {
            buckets.push(BucketPlan {
                index,
                count: members.len(),
                first_record: record,
            });
            for entry in members {
                let (name, size) = items[entry];
                let name_at = cursor;
                let data_at = align8(name_at + name.len() + 1);
                cursor = data_at + size + 1;
                slots.push(Slot {
                    entry,
                    record_at: record,
                    name_at,
                    data_at,
                    size,
                });
                record += RECORD_LEN;
            }
        }

        Self {
            start,
            buckets_at,
            records_at,
            blob_at,
            end: cursor,
            buckets,
            slots,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Partition names into buckets, in order of first appearance.
fn group_by_bucket<'a>(names: impl Iterator<Item = &'a str>) -> Vec<(usize, Vec<usize>)> {
    let mut position: [Option<usize>; BUCKET_COUNT] = [None; BUCKET_COUNT];
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();

    for (entry, name) in names.enumerate() {
        let index = bucket_of(name, BUCKET_COUNT);
        match position[index] {
            Some(group) => groups[group].1.push(entry),
            None => {
                position[index] = Some(groups.len());
                groups.push((index, vec![entry]));
            }
        }
    }
    groups
}

/// Append the ROFS section and return its start offset.
///
/// Returns `None` without touching the buffer when there are no entries.
/// Every file payload is read once before anything is appended, so a
/// missing asset leaves the buffer unchanged.
pub fn append_rofs(
    buf: &mut ImageBuf,
    format: Format,
    addressing: Addressing,
    entries: &[Entry],
) -> Result<Option<usize>> {
    if entries.is_empty() {
        return Ok(None);
    }

    let names: Vec<String> = entries.iter().map(Entry::normalized_name).collect();
    let payloads = entries
        .iter()
        .map(Entry::load)
        .collect::<Result<Vec<_>>>()?;

    let items: Vec<(&str, usize)> = names
        .iter()
        .zip(&payloads)
        .map(|(name, data)| (name.as_str(), data.len()))
        .collect();
    let plan = RofsPlan::compute(&items, buf.len());

    let start = buf.reserve(plan.len());
    assert_eq!(start, plan.start, "ROFS plan computed for a different offset");

    buf.put_u16(start, format.rofs_tag());
    buf.put_u16(start + 2, BUCKET_COUNT as u16);

    for bucket in &plan.buckets {
        let at = plan.buckets_at + BUCKET_LEN * bucket.index;
        buf.put_u32(at, to_u32("bucket entry count", bucket.count)?);
        buf.put_u32(at + 4, addressing.rofs_pointer(bucket.first_record, start)?);
    }

    for slot in &plan.slots {
        let name = names[slot.entry].as_bytes();
        let data = &payloads[slot.entry];
        assert_eq!(data.len(), slot.size, "payload changed size after planning");

        buf.put_bytes(slot.name_at, name);
        buf.put_bytes(slot.data_at, data);

        buf.put_u32(slot.record_at, addressing.rofs_pointer(slot.name_at, start)?);
        buf.put_u32(slot.record_at + 4, addressing.rofs_pointer(slot.data_at, start)?);
        buf.put_u32(slot.record_at + 8, to_u32("entry size", slot.size)?);
    }

    assert_eq!(buf.len(), plan.end, "ROFS section overran its plan");

    debug!(
        start,
        len = plan.len(),
        entries = plan.slots.len(),
        buckets = plan.buckets.len(),
        "appended ROFS section"
    );
    Ok(Some(start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_keeps_first_appearance_order() {
        let names = ["a.js", "b/c.json", "package.json"];
        let groups = group_by_bucket(names.iter().copied());
        assert_eq!(groups, vec![(10, vec![0]), (8, vec![1, 2])]);
    }

    #[test]
    fn test_plan_for_two_entries() {
        let plan = RofsPlan::compute(&[("a.js", 1), ("b/c.json", 2)], 16);

        assert_eq!(plan.buckets_at, 20);
        assert_eq!(plan.records_at, 532);
        assert_eq!(plan.blob_at, 556);

        assert_eq!(plan.slots[0].name_at, 556);
        assert_eq!(plan.slots[0].data_at, 568);
        assert_eq!(plan.slots[1].name_at, 570);
        assert_eq!(plan.slots[1].data_at, 584);
        assert_eq!(plan.end, 587);
    }

    #[test]
    fn test_data_is_eight_byte_aligned_from_image_start() {
        let items = [("x", 3), ("longer/name.txt", 17), ("z.bin", 0), ("q", 9)];
        let plan = RofsPlan::compute(&items, 12);
        for slot in &plan.slots {
            assert_eq!(slot.data_at % 8, 0, "{:?}", slot);
        }
    }

    #[test]
    fn test_append_nothing_for_empty_manifest() {
        let mut buf = ImageBuf::new();
        buf.reserve(16);
        let start = append_rofs(&mut buf, Format::Rapp, Addressing::Relative, &[]).unwrap();
        assert_eq!(start, None);
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_missing_asset_leaves_buffer_untouched() {
        let mut buf = ImageBuf::new();
        buf.reserve(16);
        let entries = [
            Entry::memory("a.js", "1"),
            Entry::file("gone.js", "/nonexistent/ruffpack/gone.js"),
        ];
        let result = append_rofs(&mut buf, Format::Rapp, Addressing::Relative, &entries);
        assert!(result.is_err());
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_written_relative_pointers() {
        let mut buf = ImageBuf::new();
        buf.reserve(16);
        let entries = [Entry::memory("a.js", "1"), Entry::memory("b/c.json", "{}")];
        append_rofs(&mut buf, Format::Rapp, Addressing::Relative, &entries).unwrap();

        let bytes = buf.as_slice();
        let u32_at = |at: usize| u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());

        assert_eq!(&bytes[16..18], &0x8000u16.to_le_bytes());
        assert_eq!(&bytes[18..20], &64u16.to_le_bytes());
        // bucket 10 -> first record, bucket 8 -> second record
        assert_eq!((u32_at(20 + 80), u32_at(20 + 84)), (1, 516));
        assert_eq!((u32_at(20 + 64), u32_at(20 + 68)), (1, 528));
        // a.js record
        assert_eq!((u32_at(532), u32_at(536), u32_at(540)), (540, 552, 1));
        // b/c.json record
        assert_eq!((u32_at(544), u32_at(548), u32_at(552)), (554, 568, 2));
        assert_eq!(&bytes[556..570], b"a.js\0\0\0\0\0\0\0\0\x31\0");
        assert_eq!(&bytes[570..587], b"b/c.json\0\0\0\0\0\0\x7b\x7d\0");
    }
}
