pub mod health;
pub mod todo_items;
pub mod todo_lists;
