pub mod common;
pub mod disks;
pub mod heal;
pub mod health;
pub mod hostfile;
pub mod info;
pub mod reboot;
pub mod sets;
