pub mod command_reader;
pub mod status_writer;
