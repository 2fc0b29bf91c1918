mod lifecycle;
mod options;
mod prepare;
mod targets;
mod watched_files;
