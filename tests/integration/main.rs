mod error_handling;
mod persistence;
mod protocol_order;
mod train_predict;
