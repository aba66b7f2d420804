fn main() {
    lidar_bin_tools::cli::run();
}
