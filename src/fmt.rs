/// Format a float as an amount with thousands separators: 1,234.56
pub fn amount(val: f64) -> String {
    let negative = val < 0.0;
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let with_commas = group_thousands(int_part);
    if negative {
        format!("-{with_commas}.{dec_part}")
    } else {
        format!("{with_commas}.{dec_part}")
    }
}

/// Row counts with thousands separators: 1,234,567
pub fn count(n: usize) -> String {
    group_thousands(&n.to_string())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}
