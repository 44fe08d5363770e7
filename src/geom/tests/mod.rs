mod test_brep_basic;
mod test_curve_basic;
