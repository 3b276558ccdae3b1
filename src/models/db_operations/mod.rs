pub mod resource_db_operations;
