pub fn parse_f64(v: Option<&serde_json::Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        return s.trim().parse::<f64>().ok();
    }
    v.as_f64()
}

pub fn parse_u64(v: Option<&serde_json::Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        return s.trim().parse::<u64>().ok();
    }
    v.as_u64()
}

pub fn non_empty_str(v: Option<&serde_json::Value>) -> Option<&str> {
    v?.as_str().map(str::trim).filter(|s| !s.is_empty())
}
