use flatdb::row::Row;
use flatdb::table::Table;
use tempfile::NamedTempFile;

#[test]
fn inserts_survive_close_and_reopen() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();

    {
        let mut table = Table::open(&path).unwrap();
        for id in 1..=40u32 {
            let row = Row::new(id, format!("user{id}"), format!("user{id}@example.com")).unwrap();
            table.insert(&row).unwrap();
        }
        table.close().unwrap();
    }

    {
        let mut table = Table::open(&path).unwrap();
        let rows = table.select_all_rows().unwrap();
        assert_eq!(rows.len(), 40);
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), (1..=40).collect::<Vec<_>>());
        for id in 1..=40u32 {
            let row = &rows[(id - 1) as usize];
            assert_eq!(row.username, format!("user{id}"));
            assert_eq!(row.email, format!("user{id}@example.com"));
        }
        table.close().unwrap();
    }
}

#[test]
fn duplicate_insert_after_reopen_is_rejected() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();

    {
        let mut table = Table::open(&path).unwrap();
        table.insert(&Row::new(1, "a", "a@x.com").unwrap()).unwrap();
        table.close().unwrap();
    }

    let mut table = Table::open(&path).unwrap();
    let err = table.insert(&Row::new(1, "b", "b@x.com").unwrap()).unwrap_err();
    assert!(matches!(err, flatdb::Error::DuplicateKey(1)));
}
