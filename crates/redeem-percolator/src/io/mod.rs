pub mod percolator_pin;
