//! Test that every mutation asks the owning record to persist exactly once.

use crate::catalogs::ReparsePoints;
use crate::e2e_tests::helpers::{dump, new_record};
use crate::storage::OwningRecord;
use crate::types::FileReference;

#[test]
fn test_one_update_per_mutation() {
    let mut record = new_record();
    let file = FileReference::new(42, 3);

    {
        let mut catalog = ReparsePoints::new(&mut record);
        catalog.add(0x1A, file).expect("add");
        catalog.add(0x1A, file).expect("add again");
        catalog.add(0x1B, file).expect("add other tag");
    }
    assert_eq!(record.updates(), 3);

    {
        let mut catalog = ReparsePoints::new(&mut record);
        assert!(catalog.remove(0x1A, file).expect("remove"));
    }
    assert_eq!(record.updates(), 4);
}

#[test]
fn test_absent_remove_still_persists() {
    let mut record = new_record();

    let removed = ReparsePoints::new(&mut record)
        .remove(0x1A, FileReference::new(1, 1))
        .expect("remove");

    assert!(!removed);
    assert_eq!(record.updates(), 1);
    assert!(!record.persisted_image().is_empty());
}

#[test]
fn test_attach_and_read_do_not_persist() {
    let mut record = new_record();
    let file = FileReference::new(3, 3);

    {
        let catalog = ReparsePoints::new(&mut record);
        catalog.contains(0x1, file).expect("contains");
        catalog.owners_of(0x1).expect("owners");
    }
    dump(&mut record);

    assert_eq!(record.updates(), 0);
    assert!(record.persisted_image().is_empty());
}

#[test]
fn test_persisted_image_tracks_every_mutation() {
    let mut record = new_record();
    let file = FileReference::new(8, 2);

    ReparsePoints::new(&mut record).add(0x1, file).expect("add");
    let after_add = record.persisted_image().to_vec();
    assert_eq!(after_add, record.to_bytes().expect("image"));
    assert!(!record.is_dirty());

    ReparsePoints::new(&mut record).remove(0x1, file).expect("remove");
    assert_ne!(record.persisted_image(), after_add);
    assert_eq!(record.persisted_image(), record.to_bytes().expect("image"));

    // Persisting again with no changes is harmless
    let image = record.persisted_image().to_vec();
    record.update_record().expect("update");
    assert_eq!(record.persisted_image(), image);
}
