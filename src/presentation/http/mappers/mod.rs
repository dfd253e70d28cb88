use crate::{
    application::services::broadcast_hub::BroadcastStats,
    presentation::http::responses::BroadcastStatsDto,
};

pub fn map_stats(stats: &BroadcastStats) -> BroadcastStatsDto {
    BroadcastStatsDto {
        connected_clients: stats.connected_clients as u64,
        uptime_seconds: stats.uptime_seconds,
        timestamp: stats.timestamp.to_rfc3339(),
    }
}
