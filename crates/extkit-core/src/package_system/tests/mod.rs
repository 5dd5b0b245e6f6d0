mod dependency_tests;
mod lifecycle_tests;
mod theme_tests;
mod uninstaller_tests;
