use crate::rowset::RowSet;
use crate::schema::{
    is_valid_table_name, normalize_column_name, normalize_table_name, ColumnType, Scalar,
};

#[test]
fn table_names_normalize_to_snake_case() {
    assert_eq!(normalize_table_name("Notas Fiscais 2024.xlsx"), "notas_fiscais_2024_xlsx");
    assert_eq!(normalize_table_name("  Vale-Refeição "), "vale_refei_o");
    assert_eq!(normalize_table_name("2024"), "_2024");
    assert_eq!(normalize_table_name("***"), "table");
}

#[test]
fn normalized_table_names_are_valid() {
    for raw in ["Employees", "1 sales", "___", "Vendas (mensal)"] {
        assert!(is_valid_table_name(&normalize_table_name(raw)), "raw={raw}");
    }
}

#[test]
fn column_names_are_uppercased() {
    assert_eq!(normalize_column_name("Valor Total"), "VALOR_TOTAL");
    assert_eq!(normalize_column_name("salário"), "SAL_RIO");
    assert_eq!(normalize_column_name(""), "COLUMN");
}

#[test]
fn declared_types_map_to_taxonomy() {
    assert_eq!(ColumnType::from_declared("BIGINT"), ColumnType::Integer);
    assert_eq!(ColumnType::from_declared("double precision"), ColumnType::Real);
    assert_eq!(ColumnType::from_declared("DATETIME"), ColumnType::Datetime);
    assert_eq!(ColumnType::from_declared("BOOLEAN"), ColumnType::Boolean);
    assert_eq!(ColumnType::from_declared("VARCHAR(40)"), ColumnType::Text);
    assert_eq!(ColumnType::from_declared(""), ColumnType::Text);
}

#[test]
fn null_is_compatible_with_every_type() {
    for ty in [
        ColumnType::Text,
        ColumnType::Integer,
        ColumnType::Real,
        ColumnType::Datetime,
        ColumnType::Boolean,
    ] {
        assert!(Scalar::Null.is_compatible_with(ty));
    }
    assert!(Scalar::Integer(1).is_compatible_with(ColumnType::Real));
    assert!(!Scalar::Text("x".into()).is_compatible_with(ColumnType::Integer));
}

#[test]
fn rowset_digest_is_deterministic_and_capped() {
    let mut rows = RowSet::new(
        "SELECT \"DEPARTMENT\", \"SALARY\" FROM \"employees\"",
        vec![
            ("DEPARTMENT".to_string(), ColumnType::Text),
            ("SALARY".to_string(), ColumnType::Real),
        ],
    );
    for i in 0..50 {
        rows.rows.push(vec![
            Scalar::Text(format!("dept-{i}")),
            Scalar::Real(1000.0 + i as f64),
        ]);
    }
    let a = rows.digest(200);
    let b = rows.digest(200);
    assert_eq!(a, b);
    assert!(a.len() <= 220);
    assert!(a.starts_with("50 rows | DEPARTMENT text, SALARY real"));
    assert!(a.ends_with('…'));
}

#[test]
fn rowset_records_preserve_column_keys() {
    let mut rows = RowSet::new(
        "SELECT \"ID\", \"NAME\" FROM \"employees\"",
        vec![
            ("ID".to_string(), ColumnType::Integer),
            ("NAME".to_string(), ColumnType::Text),
        ],
    );
    rows.rows.push(vec![Scalar::Integer(1), Scalar::Text("A".into())]);
    let records = rows.to_records();
    assert_eq!(records[0]["ID"], 1);
    assert_eq!(records[0]["NAME"], "A");
}
