pub mod admin;
pub mod heal;
pub mod health;
pub mod remote;
pub mod schedule;
pub mod shutdown;
pub mod sigv4;
pub mod topology;
