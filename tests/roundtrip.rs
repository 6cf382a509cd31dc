//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! End-to-end coverage driven through an actual on-disk file and a real
//! `memmap2` mapping, rather than an in-memory `Cursor`.

use std::fs::File;

use mvl::document::{ElementType, NO_METADATA};
use mvl::error::OnError;
use mvl::reader::ColumnView;
use mvl::{Reader, Writer};

fn mapped_bytes(build: impl FnOnce(&mut Writer<File>)) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.mvl");
    let file = File::create(&path).unwrap();
    let mut writer = Writer::create_default(file, OnError::Return).unwrap();
    build(&mut writer);
    writer.close().unwrap();
    (dir, path)
}

#[test]
fn s1_roundtrip_one_million_doubles() {
    let data: Vec<f64> = (0..1_000_000u64).map(|i| i as f64 * 0.5).collect();
    let (_dir, path) = mapped_bytes(|w| {
        let offset = w.write_vector(ElementType::Double, &data, NO_METADATA).unwrap();
        w.add_directory_entry(offset, b"samples");
    });

    let file = File::open(&path).unwrap();
    let mmap = unsafe { memmap2::Mmap::map(&file).unwrap() };
    let reader = Reader::load_image(&mmap).unwrap();

    let offset = reader.find_directory_entry(b"samples").unwrap();
    let vector = reader.vector_at(offset).unwrap();
    match vector.view {
        ColumnView::Double(values) => {
            assert_eq!(values.len(), 1_000_000);
            assert_eq!(values[0], 0.0);
            assert_eq!(values[999_999], 499_999.5);
        }
        _ => panic!("expected a double vector"),
    }
}

#[test]
fn s2_packed_string_list() {
    let entries: [&[u8]; 3] = [b"alpha", b"beta", b"gamma"];
    let (_dir, path) = mapped_bytes(|w| {
        let offset = w.write_packed_list(&entries, NO_METADATA).unwrap();
        w.add_directory_entry(offset, b"names");
    });

    let file = File::open(&path).unwrap();
    let mmap = unsafe { memmap2::Mmap::map(&file).unwrap() };
    let reader = Reader::load_image(&mmap).unwrap();

    let offset = reader.find_directory_entry(b"names").unwrap();
    let vector = reader.vector_at(offset).unwrap();
    assert_eq!(vector.len(), 3);
    assert_eq!(vector.view.packed_list_entry(0), Some(&b"alpha"[..]));
    assert_eq!(vector.view.packed_list_entry(1), Some(&b"beta"[..]));
    assert_eq!(vector.view.packed_list_entry(2), Some(&b"gamma"[..]));
}

#[test]
fn s3_sort_multi_key() {
    let primary = [1i32, 0, 1, 0];
    let secondary = [2i32, 2, 1, 1];
    let columns = [ColumnView::Int32(&primary), ColumnView::Int32(&secondary)];
    let index = mvl::sort::sort_multi_key(&columns, false);
    assert_eq!(index, vec![3, 1, 2, 0]);
}

#[test]
fn s4_join_produces_documented_pairs() {
    let key = [10i32, 20, 30];
    let key_columns = [ColumnView::Int32(&key)];
    let key_indices: Vec<u64> = (0..3).collect();
    let key_hashes = mvl::join::hash_indices(&key_columns, &key_indices);

    let main = [30i32, 10, 10, 40, 20];
    let main_columns = [ColumnView::Int32(&main)];
    let indices: Vec<u64> = (0..5).collect();
    let hashes = mvl::join::hash_indices(&main_columns, &indices);
    let hash_map = mvl::join::HashMap64::build(hashes);

    let (key_match, matches, key_last) = hash_map
        .find_matches(&key_indices, &key_hashes, &key_columns, &indices, &main_columns, None)
        .unwrap();

    assert_eq!(key_last, vec![2, 3, 4]);
    let pairs: Vec<(u64, u64)> = key_match.into_iter().zip(matches.into_iter()).collect();
    assert_eq!(pairs.len(), 4);
    for (k, m) in &pairs {
        assert_eq!(key[*k as usize], main[*m as usize]);
    }
}

#[test]
fn s5_group_by_produces_two_chains() {
    let raw: [&[u8]; 5] = [b"x", b"y", b"x", b"x", b"y"];
    let mut offsets = vec![0u64];
    let mut cursor = 0u64;
    for entry in &raw {
        cursor += entry.len() as u64;
        offsets.push(cursor);
    }
    let bytes: Vec<u8> = raw.iter().flat_map(|e| e.iter().copied()).collect();
    let columns = [ColumnView::PackedList { offsets: &offsets, bytes: &bytes }];

    let indices: Vec<u64> = (0..5).collect();
    let hashes = mvl::join::hash_indices(&columns, &indices);
    let hash_map = mvl::join::HashMap64::build(hashes);
    let mut groups = hash_map.find_groups(&indices, &columns);
    for group in groups.iter_mut() {
        group.sort_unstable();
    }
    groups.sort_by_key(|g| g[0]);

    assert_eq!(groups, vec![vec![0, 2, 3], vec![1, 4]]);
}

#[test]
fn s6_endianness_mismatch_is_rejected() {
    let (_dir, path) = mapped_bytes(|w| {
        let offset = w.write_vector(ElementType::Int32, &[1i32, 2, 3], NO_METADATA).unwrap();
        w.add_directory_entry(offset, b"x");
    });

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[4..8].reverse();
    std::fs::write(&path, &bytes).unwrap();

    let file = File::open(&path).unwrap();
    let mmap = unsafe { memmap2::Mmap::map(&file).unwrap() };
    let result = Reader::load_image(&mmap);
    assert!(matches!(result, Err(mvl::Error::WrongEndianness)));
}

#[test]
fn extent_index_persists_and_reloads() {
    let values = [1i32, 1, 2, 2, 2, 3];
    let (_dir, path) = mapped_bytes(|w| {
        let data_offset = w.write_vector(ElementType::Int32, &values, NO_METADATA).unwrap();
        w.add_directory_entry(data_offset, b"column");

        let columns = [ColumnView::Int32(&values)];
        let index = mvl::extent::ExtentIndex::compute(&columns);
        let index_offset = index.write(w).unwrap();
        w.add_directory_entry(index_offset, b"column_index");
    });

    let file = File::open(&path).unwrap();
    let mmap = unsafe { memmap2::Mmap::map(&file).unwrap() };
    let reader = Reader::load_image(&mmap).unwrap();

    let index_offset = reader.find_directory_entry(b"column_index").unwrap();
    let loaded = mvl::extent::ExtentIndex::load(&reader, index_offset).unwrap();
    assert_eq!(loaded.partition.to_vec(), vec![0, 2, 5, 6]);

    let columns = [ColumnView::Int32(&values)];
    let query_hash = mvl::join::hash_row(&columns, 2);
    let mut out = Vec::new();
    loaded.get_extents(query_hash, &mut out);
    assert!(out.contains(&(2, 5)));
}
