pub mod print_job;
