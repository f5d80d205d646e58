use chrono::Utc;

pub struct Utils {}

impl Utils {
    /// Current time as Unix seconds (UTC). All stored timestamps use this unit.
    pub fn now_secs() -> i64 {
        Utc::now().timestamp()
    }

    pub fn opt_u32_to_opt_i64(opt_u32: Option<u32>) -> Option<i64> {
        opt_u32.map(i64::from)
    }

    pub fn opt_i64_to_opt_u32(opt_i64: Option<i64>) -> Option<u32> {
        opt_i64.and_then(|v| v.try_into().ok())
    }
}
