use poem_openapi::Object;

#[derive(Object)]
pub struct PublishAcceptedDto {
    pub accepted: bool,
    pub event_id: i64,
}

#[derive(Object)]
pub struct BroadcastStatsDto {
    pub connected_clients: u64,
    pub uptime_seconds: u64,
    pub timestamp: String,
}
