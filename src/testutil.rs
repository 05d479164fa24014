//! Fixture builders shared by the unit tests.

use rusqlite::Connection;

use crate::models::Dataset;
use crate::source::{read_from, SourceSchema};

pub const HEADER: &str = "Customer_Name,Customer_Address,Customer_City,Customer_State,Customer_Country,\
Company,Job_Title,Email,Phone_Number,Credit_Card_Number,IBAN,Currency_Code,Random_Number,Category,\
Group,Is_Active,Last_Updated,Description,Gender,Marital_Status,Transaction_Date,Amount,Transaction_Type";

/// One CSV line; columns not mentioned are left empty.
pub fn line(fields: &[(&str, &str)]) -> String {
    HEADER
        .split(',')
        .map(|h| {
            fields
                .iter()
                .find(|(c, _)| *c == h)
                .map(|(_, v)| *v)
                .unwrap_or("")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// A fully populated row, distinct per `n`.
pub fn full_line(n: usize) -> String {
    let name = format!("Customer {n}");
    let email = format!("c{n}@example.com");
    let amount = format!("{}.25", 100 + n);
    line(&[
        ("Customer_Name", &name),
        ("Customer_Address", "1 Marina Rd"),
        ("Customer_City", "Lagos"),
        ("Customer_State", "Lagos"),
        ("Customer_Country", "Nigeria"),
        ("Company", "Acme Ltd"),
        ("Job_Title", "Analyst"),
        ("Email", &email),
        ("Phone_Number", "+234-555-0100"),
        ("Credit_Card_Number", "4111111111111111"),
        ("IBAN", "GB29NWBK60161331926819"),
        ("Currency_Code", "NGN"),
        ("Random_Number", "0.42"),
        ("Category", "Retail"),
        ("Group", "G1"),
        ("Is_Active", "Yes"),
        ("Last_Updated", "2023-02-01 10:00:00"),
        ("Description", "card payment"),
        ("Gender", "Female"),
        ("Marital_Status", "Single"),
        ("Transaction_Date", "2023-01-01"),
        ("Amount", &amount),
        ("Transaction_Type", "Debit"),
    ])
}

pub fn csv_text(lines: &[String]) -> String {
    let mut csv = format!("{HEADER}\n");
    for l in lines {
        csv.push_str(l);
        csv.push('\n');
    }
    csv
}

pub fn load(lines: &[String]) -> Dataset {
    read_from(csv_text(lines).as_bytes(), &SourceSchema::nuga_bank_v1()).unwrap()
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT count(*) FROM \"{table}\""), [], |r| r.get(0))
        .unwrap()
}
