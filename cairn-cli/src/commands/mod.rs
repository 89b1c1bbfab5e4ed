pub mod publish;
pub mod stream;
pub mod update_index;
