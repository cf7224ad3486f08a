pub mod gain;
pub mod pcm_header;
pub mod sample_buffer;
pub mod wav_format;
