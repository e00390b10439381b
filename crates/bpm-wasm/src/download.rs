//! Browser file download: Blob → object URL → temporary `<a download>`.

use bpm_editor::{DownloadError, DownloadFile, Downloader};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, Document, HtmlAnchorElement, Url};

pub struct BrowserDownloader {
    document: Document,
}

impl BrowserDownloader {
    pub fn new() -> Result<Self, DownloadError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| DownloadError::Create("no document".to_string()))?;
        Ok(Self { document })
    }
}

impl Downloader for BrowserDownloader {
    /// Object URL of the blob.
    type Handle = String;

    fn create(&mut self, file: &DownloadFile) -> Result<String, DownloadError> {
        let parts = js_sys::Array::of1(&JsValue::from_str(&file.contents));
        let options = BlobPropertyBag::new();
        options.set_type(&file.mime_type);
        let blob = Blob::new_with_str_sequence_and_options(&parts, &options)
            .map_err(|e| DownloadError::Create(describe(&e)))?;
        Url::create_object_url_with_blob(&blob).map_err(|e| DownloadError::Create(describe(&e)))
    }

    fn trigger(&mut self, url: &String, file_name: &str) -> Result<(), DownloadError> {
        let anchor: HtmlAnchorElement = self
            .document
            .create_element("a")
            .map_err(|e| DownloadError::Trigger(describe(&e)))?
            .dyn_into()
            .map_err(|_| DownloadError::Trigger("not an anchor element".to_string()))?;
        anchor.set_href(url);
        anchor.set_download(file_name);
        anchor.click();
        Ok(())
    }

    fn release(&mut self, url: String) {
        if let Err(e) = Url::revoke_object_url(&url) {
            log::warn!("could not revoke {url}: {}", describe(&e));
        }
    }
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
