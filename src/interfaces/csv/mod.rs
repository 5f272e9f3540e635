pub mod book_reader;
pub mod report_writer;
