pub mod cusum;
