mod database_operations;
mod screening;
