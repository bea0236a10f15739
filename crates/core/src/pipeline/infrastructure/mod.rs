pub mod interval_refresh_clock;
pub mod live_session;
