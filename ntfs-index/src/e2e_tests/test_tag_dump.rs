//! Test the add, dump, remove, dump cycle for a single reparse point.

use crate::catalogs::ReparsePoints;
use crate::e2e_tests::helpers::{DUMP_HEADER, dump, new_record, try_dump};
use crate::types::FileReference;

#[test]
fn test_add_then_dump_shows_entry() {
    let mut record = new_record();
    let file = FileReference::new(42, 3);

    ReparsePoints::new(&mut record)
        .add(0x1A, file)
        .expect("add");

    let text = dump(&mut record);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "REPARSE POINT INDEX",
            "  REPARSE POINT INDEX ENTRY",
            "            Tag: 1a",
            "  MFT Reference: 42:3",
        ]
    );
}

#[test]
fn test_remove_then_dump_shows_header_only() {
    let mut record = new_record();
    let file = FileReference::new(42, 3);

    let mut catalog = ReparsePoints::new(&mut record);
    catalog.add(0x1A, file).expect("add");
    assert!(catalog.remove(0x1A, file).expect("remove"));
    assert!(!catalog.contains(0x1A, file).expect("contains"));

    assert_eq!(dump(&mut record), format!("{DUMP_HEADER}\n"));
}

#[test]
fn test_dump_of_new_catalog_is_header_only() {
    let mut record = new_record();
    assert_eq!(dump(&mut record), format!("{DUMP_HEADER}\n"));
}

#[test]
fn test_dump_indent_prefixes_every_line() {
    let mut record = new_record();
    ReparsePoints::new(&mut record)
        .add(0xA000_0003, FileReference::new(5, 5))
        .expect("add");

    let text = try_dump(&mut record, "    ").expect("dump");
    assert!(text.lines().all(|line| line.starts_with("    ")));
    assert!(text.contains("    REPARSE POINT INDEX\n"));
    assert!(text.contains("                Tag: a0000003\n"));
    assert!(text.contains("      MFT Reference: 5:5\n"));
}

#[test]
fn test_dump_does_not_modify_record() {
    let mut record = new_record();
    ReparsePoints::new(&mut record)
        .add(0x1A, FileReference::new(42, 3))
        .expect("add");
    let updates = record.updates();
    let image = record.to_bytes().expect("image");

    dump(&mut record);
    dump(&mut record);

    assert_eq!(record.updates(), updates);
    assert_eq!(record.to_bytes().expect("image"), image);
    assert!(!record.is_dirty());
}
