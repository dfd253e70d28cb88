pub mod redis_bus;
