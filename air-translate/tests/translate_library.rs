//! Black-box tests against `translate_library`, the only public entry point
//! (spec.md §6 container format). These stay below the bitcode boundary:
//! fabricating a real LLVM bitcode module by hand isn't something this test
//! file can do confidently, so coverage here is container-level — magic
//! validation, an empty function list, and the non-entry-point skip that
//! `translate_library` performs before it ever opens a bitcode blob.

use air_translate::{translate_library, TranslationError};

const HEADER_LEN: usize = 88;

fn push_tag(buf: &mut Vec<u8>, tag: &[u8; 4], value: &[u8]) {
    buf.extend_from_slice(tag);
    buf.extend_from_slice(&(value.len() as u16).to_le_bytes());
    buf.extend_from_slice(value);
}

/// Builds a minimal `.metallib`-shaped byte buffer with zero or one function
/// list entries, mirroring the real container layout spec.md §6 describes.
fn build_library(func_list: &[u8]) -> Vec<u8> {
    let func_list_offset = HEADER_LEN as u64;
    let bc_offset = func_list_offset + func_list.len() as u64;

    let mut header = Vec::new();
    header.extend_from_slice(b"MTLB");
    header.extend_from_slice(&1u16.to_le_bytes()); // platformID
    header.extend_from_slice(&1u16.to_le_bytes()); // fileMajor
    header.extend_from_slice(&0u16.to_le_bytes()); // fileMinor
    header.push(0); // libType
    header.push(0); // targetOS
    header.extend_from_slice(&0u16.to_le_bytes()); // osMajor
    header.extend_from_slice(&0u16.to_le_bytes()); // osMinor
    header.extend_from_slice(&bc_offset.to_le_bytes()); // fileSize
    header.extend_from_slice(&func_list_offset.to_le_bytes());
    header.extend_from_slice(&(func_list.len() as u64).to_le_bytes());
    header.extend_from_slice(&0u64.to_le_bytes()); // pubMetaOffset
    header.extend_from_slice(&0u64.to_le_bytes()); // pubMetaSize
    header.extend_from_slice(&0u64.to_le_bytes()); // privMetaOffset
    header.extend_from_slice(&0u64.to_le_bytes()); // privMetaSize
    header.extend_from_slice(&bc_offset.to_le_bytes()); // bcOffset
    header.extend_from_slice(&0u64.to_le_bytes()); // bcSize
    assert_eq!(header.len(), HEADER_LEN);

    let mut out = header;
    out.extend_from_slice(func_list);
    out
}

fn empty_function_list() -> Vec<u8> {
    0u32.to_le_bytes().to_vec()
}

fn one_function_entry(name: &str, kind: u8) -> Vec<u8> {
    let mut group = Vec::new();
    push_tag(&mut group, b"NAME", name.as_bytes());
    push_tag(&mut group, b"MDSZ", &0u64.to_le_bytes());
    push_tag(&mut group, b"TYPE", &[kind]);
    let mut offt = Vec::new();
    offt.extend_from_slice(&0u64.to_le_bytes());
    offt.extend_from_slice(&0u64.to_le_bytes());
    offt.extend_from_slice(&0u64.to_le_bytes());
    push_tag(&mut group, b"OFFT", &offt);
    group.extend_from_slice(b"ENDT");

    let mut func_list = Vec::new();
    func_list.extend_from_slice(&1u32.to_le_bytes());
    func_list.extend_from_slice(&((group.len() + 4) as u32).to_le_bytes());
    func_list.extend_from_slice(&group);
    func_list
}

#[test]
fn rejects_bad_magic() {
    let bytes = vec![0u8; HEADER_LEN];
    let err = translate_library(&bytes).unwrap_err();
    assert!(matches!(err, TranslationError::BadMagic));
}

#[test]
fn empty_function_list_translates_to_no_functions() {
    let bytes = build_library(&empty_function_list());
    let library = translate_library(&bytes).expect("a library with no functions still parses");
    assert!(library.functions.is_empty());
}

/// `TYPE=6` is `Intersection` (spec.md §6), a ray-tracing kind out of scope
/// per spec.md §1 Non-goals; `translate_library` skips it without ever
/// reading its (empty, here) bitcode range.
#[test]
fn skips_non_entry_point_function_kinds() {
    let bytes = build_library(&one_function_entry("intersect_main", 6));
    let library = translate_library(&bytes).expect("non-entry-point kinds are skipped, not rejected");
    assert!(library.functions.is_empty());
    assert!(library.function("intersect_main").is_none());
}

#[test]
fn truncated_header_is_rejected() {
    let bytes = vec![0u8; HEADER_LEN - 1];
    assert!(translate_library(&bytes).is_err());
}
