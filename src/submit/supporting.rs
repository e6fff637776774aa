//! Stage supporting files from the job controller into the working directory

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use reqwest::blocking::Client;
use url::Url;

use crate::pipe::args::PipelineArgs;
use crate::request::job::SupportingFile;
use crate::Result;

/// Directory under the working directory holding staged supporting files
pub const SUPPORTING_FILES: &str = "supporting_files";

/// Fetches a supporting file's content by its download token
pub trait FileFetcher {
    fn fetch(&self, token: &str) -> Result<Vec<u8>>;
}

/// Downloads supporting files from the job controller's file download endpoint
pub struct HttpFetcher {
    client: Client,
    download_url: Url,
}

impl HttpFetcher {
    pub fn new(job_controller_url: &Url) -> Result<HttpFetcher> {
        Ok(HttpFetcher {
            client: Client::new(),
            download_url: job_controller_url.join("bilby/file_download/")?,
        })
    }

    fn url(&self, token: &str) -> Url {
        let mut url = self.download_url.clone();
        url.query_pairs_mut().append_pair("fileId", token);
        url
    }
}

impl FileFetcher for HttpFetcher {
    fn fetch(&self, token: &str) -> Result<Vec<u8>> {
        let url = self.url(token);
        info!("Downloading supporting file from {}", self.download_url);
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Download every supporting file into `<workdir>/supporting_files/<type>/` and point the
/// matching pipeline option at the local copy
pub fn stage_supporting_files(
    files: &[SupportingFile],
    args: &mut PipelineArgs,
    working_directory: &Path,
    fetcher: &dyn FileFetcher,
) -> Result<()> {
    for file in files {
        let path = stage_file(file, working_directory, fetcher)?;
        patch_args(args, file, &path)?;
    }
    Ok(())
}

fn stage_file(
    file: &SupportingFile,
    working_directory: &Path,
    fetcher: &dyn FileFetcher,
) -> Result<PathBuf> {
    let dir = working_directory.join(SUPPORTING_FILES).join(file.file_type.to_string());
    fs::create_dir_all(&dir)?;

    // only the file name is trusted, never a directory part
    let name = Path::new(&file.file_name).file_name().unwrap_or_else(|| "supporting_file".as_ref());
    let path = dir.join(name);

    let content = fetcher.fetch(&file.token)?;
    info!("Writing supporting file {} ({} bytes)", path.display(), content.len());
    fs::write(&path, content)?;
    Ok(path)
}

fn patch_args(args: &mut PipelineArgs, file: &SupportingFile, path: &Path) -> Result<()> {
    let attribute = file.file_type.attribute();
    let path = path.to_string_lossy().into_owned();
    match &file.key {
        Some(key) => {
            let mut dict = args.get_dict(attribute)?;
            dict.insert(key.clone(), path);
            args.set_dict(attribute, &dict);
        }
        None => args.set(attribute, path),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::request::job::SupportingFileType;

    struct MapFetcher(HashMap<&'static str, &'static [u8]>);

    impl FileFetcher for MapFetcher {
        fn fetch(&self, token: &str) -> Result<Vec<u8>> {
            self.0.get(token).map(|content| content.to_vec()).ok_or_else(|| {
                crate::BundleError::InvalidParameters(format!("unknown token {token}"))
            })
        }
    }

    fn file(
        file_type: SupportingFileType,
        key: Option<&str>,
        file_name: &str,
        token: &str,
    ) -> SupportingFile {
        SupportingFile {
            file_type,
            key: key.map(str::to_string),
            file_name: file_name.to_string(),
            token: token.to_string(),
        }
    }

    #[test]
    fn stages_files_and_patches_args() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MapFetcher(HashMap::from([
            ("t1", b"psd h1".as_slice()),
            ("t2", b"psd l1".as_slice()),
            ("t3", b"prior".as_slice()),
        ]));
        let ini = "psd-dict = {V1: /existing/v1.txt}\nprior-file = 4s\n";
        let mut args = PipelineArgs::parse(ini).unwrap();
        let files = [
            file(SupportingFileType::Psd, Some("H1"), "h1.txt", "t1"),
            file(SupportingFileType::Psd, Some("L1"), "../../l1.txt", "t2"),
            file(SupportingFileType::Pri, None, "custom.prior", "t3"),
        ];

        stage_supporting_files(&files, &mut args, dir.path(), &fetcher).unwrap();

        let psd_dir = dir.path().join("supporting_files/psd");
        assert_eq!(fs::read(psd_dir.join("h1.txt")).unwrap(), b"psd h1");
        assert_eq!(fs::read(psd_dir.join("l1.txt")).unwrap(), b"psd l1");

        let psd = args.get_dict("psd_dict").unwrap();
        assert_eq!(psd["V1"], "/existing/v1.txt");
        assert_eq!(psd["H1"], psd_dir.join("h1.txt").to_string_lossy());
        assert_eq!(psd["L1"], psd_dir.join("l1.txt").to_string_lossy());

        let prior = dir.path().join("supporting_files/pri/custom.prior");
        assert_eq!(args.get("prior_file"), Some(&*prior.to_string_lossy()));
    }

    #[test]
    fn fetch_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MapFetcher(HashMap::new());
        let mut args = PipelineArgs::default();
        let files = [file(SupportingFileType::Gps, None, "gps.txt", "missing")];
        assert!(stage_supporting_files(&files, &mut args, dir.path(), &fetcher).is_err());
    }

    #[test]
    fn download_url_carries_token() {
        let base = Url::parse("https://gwcloud.org.au/").unwrap();
        let fetcher = HttpFetcher::new(&base).unwrap();
        assert_eq!(
            fetcher.url("abc-123").as_str(),
            "https://gwcloud.org.au/bilby/file_download/?fileId=abc-123"
        );
    }
}
