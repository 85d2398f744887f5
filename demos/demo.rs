use cdpdrive::browser::Browser;
use futures::StreamExt;

#[async_std::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = "ws://127.0.0.1:53114/devtools/browser/c0606c14-d0ae-4285-90cd-932bbf38bae7";

    let (browser, mut handler) = Browser::connect(url).await?;

    let handle = async_std::task::spawn(async move {
        loop {
            let res = handler.next().await.unwrap();
            dbg!(res);
        }
    });

    let page = browser.new_page("about:blank").await?;
    let doc = page.get_document().await?;
    dbg!(doc);

    page.close().await?;
    handle.await;

    Ok(())
}
